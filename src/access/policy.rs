//! Pure authorization decisions.
//!
//! [`decide`] takes the acting subject, the requested operation, the resource
//! with the ownership/authorship facts already loaded, and the relationship
//! facts resolved for the subject. It performs no I/O, so every rule can be
//! exercised directly in tests. Anything not explicitly allowed is denied.

use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

use super::catalog::Role;

/// The authenticated caller. `role` is `None` when the token carried a role
/// the access model does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub role: Option<Role>,
}

impl Subject {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role: Some(role),
        }
    }

    pub fn unrecognized(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    pub fn is_consultant(&self) -> bool {
        self.role == Some(Role::Consultant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    List,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::List,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::List => "list",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Dog,
    Event,
    EventComment,
    ConsultantNote,
    ConsultantProfile,
    Permissions,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Dog => "dog",
            ResourceKind::Event => "event",
            ResourceKind::EventComment => "event_comment",
            ResourceKind::ConsultantNote => "consultant_note",
            ResourceKind::ConsultantProfile => "consultant_profile",
            ResourceKind::Permissions => "permissions",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and owner of a dog, as loaded from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DogRef {
    pub id: Uuid,
    pub owner_id: Uuid,
}

/// The target of an authorization check.
///
/// Collection variants (`Dogs`, `Events`, ...) stand for list or create
/// requests where no single row exists yet; row filtering for lists happens
/// in the query, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Dogs,
    Dog(DogRef),
    Events,
    /// An event, scoped through its dog. Also used to create an event for a dog.
    Event { dog: Option<DogRef> },
    /// The comment thread of one event (create and list).
    EventComments { event_dog: Option<DogRef> },
    EventComment {
        author_id: Uuid,
        event_dog: Option<DogRef>,
    },
    ConsultantNotes,
    /// A note about to be written for `dog`.
    NewConsultantNote { dog: DogRef },
    ConsultantNote { author_id: Uuid },
    ConsultantProfiles,
    ConsultantProfile { user_id: Uuid },
    UserPermissions { user_id: Uuid },
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Dogs | Resource::Dog(_) => ResourceKind::Dog,
            Resource::Events | Resource::Event { .. } => ResourceKind::Event,
            Resource::EventComments { .. } | Resource::EventComment { .. } => {
                ResourceKind::EventComment
            }
            Resource::ConsultantNotes
            | Resource::NewConsultantNote { .. }
            | Resource::ConsultantNote { .. } => ResourceKind::ConsultantNote,
            Resource::ConsultantProfiles | Resource::ConsultantProfile { .. } => {
                ResourceKind::ConsultantProfile
            }
            Resource::UserPermissions { .. } => ResourceKind::Permissions,
        }
    }

    /// The dog whose consultant grants matter for this resource, if any.
    pub fn related_dog(&self) -> Option<DogRef> {
        match *self {
            Resource::Dog(dog) => Some(dog),
            Resource::Event { dog } => dog,
            Resource::EventComments { event_dog } => event_dog,
            Resource::EventComment { event_dog, .. } => event_dog,
            Resource::NewConsultantNote { dog } => Some(dog),
            _ => None,
        }
    }
}

/// Relationship facts resolved for one subject before deciding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    accessible_dogs: BTreeSet<Uuid>,
}

impl Relations {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_access_to(dog_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            accessible_dogs: dog_ids.into_iter().collect(),
        }
    }

    pub fn grant(&mut self, dog_id: Uuid) {
        self.accessible_dogs.insert(dog_id);
    }

    pub fn has_access(&self, dog_id: Uuid) -> bool {
        self.accessible_dogs.contains(&dog_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("unrecognized role")]
    UnrecognizedRole,
    #[error("{role} may not {operation} {resource}")]
    RoleNotPermitted {
        role: Role,
        operation: Operation,
        resource: ResourceKind,
    },
    #[error("user does not own this dog")]
    NotOwner,
    #[error("consultant does not have access to this dog")]
    NoConsultantAccess,
    #[error("consultants cannot modify dogs")]
    ConsultantReadOnly,
    #[error("event has no associated dog")]
    EventWithoutDog,
    #[error("only the author can modify this {0}")]
    NotAuthor(ResourceKind),
    #[error("only the profile owner can change this profile")]
    NotSelf,
    #[error("admin role required")]
    AdminOnly,
    #[error("missing required permission (any of: {})", .0.join(", "))]
    MissingPermission(Vec<String>),
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::UnrecognizedRole => "UNRECOGNIZED_ROLE",
            DenyReason::RoleNotPermitted { .. } => "ROLE_NOT_PERMITTED",
            DenyReason::NotOwner => "NOT_OWNER",
            DenyReason::NoConsultantAccess => "NO_CONSULTANT_ACCESS",
            DenyReason::ConsultantReadOnly => "CONSULTANT_READ_ONLY",
            DenyReason::EventWithoutDog => "EVENT_WITHOUT_DOG",
            DenyReason::NotAuthor(_) => "NOT_AUTHOR",
            DenyReason::NotSelf => "NOT_SELF",
            DenyReason::AdminOnly => "ADMIN_ONLY",
            DenyReason::MissingPermission(_) => "PERMISSION_DENIED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny(_) => "deny",
        }
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Decides whether `subject` may perform `operation` on `resource`.
pub fn decide(
    subject: &Subject,
    operation: Operation,
    resource: &Resource,
    relations: &Relations,
) -> Decision {
    let Some(role) = subject.role else {
        return Decision::Deny(DenyReason::UnrecognizedRole);
    };
    if role == Role::Admin {
        return Decision::Allow;
    }

    let ctx = Ctx {
        user_id: subject.user_id,
        role,
        operation,
        relations,
    };

    match *resource {
        Resource::Dogs => match operation {
            Operation::List => Decision::Allow,
            Operation::Create if role == Role::Owner => Decision::Allow,
            _ => ctx.not_permitted(ResourceKind::Dog),
        },
        Resource::Dog(dog) => match operation {
            Operation::Read => ctx.dog_relationship(&dog),
            Operation::Update | Operation::Delete => match ctx.dog_relationship(&dog) {
                Decision::Allow if role == Role::Consultant => {
                    Decision::Deny(DenyReason::ConsultantReadOnly)
                }
                decision => decision,
            },
            Operation::Create | Operation::List => ctx.not_permitted(ResourceKind::Dog),
        },
        Resource::Events => match operation {
            Operation::List => Decision::Allow,
            _ => ctx.not_permitted(ResourceKind::Event),
        },
        Resource::Event { dog } => match operation {
            Operation::Create | Operation::Read | Operation::Update | Operation::Delete => {
                ctx.through_event_dog(dog.as_ref())
            }
            Operation::List => ctx.not_permitted(ResourceKind::Event),
        },
        Resource::EventComments { event_dog } => match operation {
            Operation::Create | Operation::List => ctx.through_event_dog(event_dog.as_ref()),
            _ => ctx.not_permitted(ResourceKind::EventComment),
        },
        Resource::EventComment {
            author_id,
            event_dog,
        } => match operation {
            Operation::Read => ctx.through_event_dog(event_dog.as_ref()),
            Operation::Update | Operation::Delete => {
                ctx.authored(author_id, ResourceKind::EventComment)
            }
            Operation::Create | Operation::List => ctx.not_permitted(ResourceKind::EventComment),
        },
        Resource::ConsultantNotes => match operation {
            Operation::List => Decision::Allow,
            _ => ctx.not_permitted(ResourceKind::ConsultantNote),
        },
        Resource::NewConsultantNote { dog } => match (operation, role) {
            (Operation::Create, Role::Consultant) => {
                if relations.has_access(dog.id) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::NoConsultantAccess)
                }
            }
            _ => ctx.not_permitted(ResourceKind::ConsultantNote),
        },
        Resource::ConsultantNote { author_id } => match operation {
            Operation::Read | Operation::Update | Operation::Delete => {
                ctx.authored(author_id, ResourceKind::ConsultantNote)
            }
            Operation::Create | Operation::List => {
                ctx.not_permitted(ResourceKind::ConsultantNote)
            }
        },
        Resource::ConsultantProfiles => match operation {
            Operation::List => Decision::Allow,
            _ => ctx.not_permitted(ResourceKind::ConsultantProfile),
        },
        Resource::ConsultantProfile { user_id } => match operation {
            Operation::Read => Decision::Allow,
            Operation::Create | Operation::Update if user_id == subject.user_id => Decision::Allow,
            Operation::Create | Operation::Update => Decision::Deny(DenyReason::NotSelf),
            _ => ctx.not_permitted(ResourceKind::ConsultantProfile),
        },
        Resource::UserPermissions { user_id } => match operation {
            Operation::Read | Operation::List if user_id == subject.user_id => Decision::Allow,
            _ => Decision::Deny(DenyReason::AdminOnly),
        },
    }
}

struct Ctx<'a> {
    user_id: Uuid,
    role: Role,
    operation: Operation,
    relations: &'a Relations,
}

impl Ctx<'_> {
    fn dog_relationship(&self, dog: &DogRef) -> Decision {
        match self.role {
            Role::Admin => Decision::Allow,
            Role::Owner if dog.owner_id == self.user_id => Decision::Allow,
            Role::Owner => Decision::Deny(DenyReason::NotOwner),
            Role::Consultant if self.relations.has_access(dog.id) => Decision::Allow,
            Role::Consultant => Decision::Deny(DenyReason::NoConsultantAccess),
        }
    }

    fn through_event_dog(&self, dog: Option<&DogRef>) -> Decision {
        match dog {
            Some(dog) => self.dog_relationship(dog),
            None => Decision::Deny(DenyReason::EventWithoutDog),
        }
    }

    fn authored(&self, author_id: Uuid, kind: ResourceKind) -> Decision {
        if author_id == self.user_id {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotAuthor(kind))
        }
    }

    fn not_permitted(&self, resource: ResourceKind) -> Decision {
        Decision::Deny(DenyReason::RoleNotPermitted {
            role: self.role,
            operation: self.operation,
            resource,
        })
    }
}
