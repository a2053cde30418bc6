//! Entity type definitions
//!
//! The roster stores the following records:
//!
//! **Hierarchies** (self-referential trees, see [`TreeNode`]):
//! - [`Region`] - Geographic/organizational regions a member belongs to
//! - [`Position`] - Roles, ordered among siblings by `rank`
//!
//! **People:**
//! - [`Member`] - A person, with optional phone, region and department
//! - [`Department`] - Flat grouping of members
//! - [`MemberPosition`] - Association between a member and a position,
//!   at most one flagged primary per member

pub mod department;
pub mod member;
pub mod member_position;
pub mod position;
pub mod region;
pub mod tree;

pub use department::Department;
pub use member::{Member, MemberDraft};
pub use member_position::{AssignedPosition, MemberPosition};
pub use position::Position;
pub use region::Region;
pub use tree::TreeNode;
