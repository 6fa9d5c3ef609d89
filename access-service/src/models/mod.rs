pub mod assignment;
pub mod context_kind;
pub mod decision;
pub mod user;

pub use assignment::{
    Assignment, AssignmentResponse, AssignmentRow, CreateAssignmentRequest, GrantKey,
    NewAssignment, UpdateAssignmentRequest, ValidityWindow, WindowError,
};
pub use context_kind::{ContextKind, ExtensionKind, InvalidContextKind};
pub use decision::Decision;
pub use user::{ClaimsError, UserContext, UserRecord};
