//! Intrusive, relative-index container family.
//!
//! BSD-queue style containers whose links are [`RelIdx`](crate::idx::RelIdx)
//! values instead of pointers. Every operation takes the backing arena
//! explicitly; the containers own nothing. The C-macro "field name" argument
//! becomes an accessor type implementing the per-flavor `*Entry` trait, so a
//! single element type can sit in several containers at once:
//!
//! ```
//! use relq::queue::tailq::{TailqEntry, TailqHead, TailqLink};
//! use relq::RelIdx;
//!
//! struct Job {
//!     prio: u32,
//!     link: TailqLink,
//! }
//!
//! enum ByLink {}
//! impl TailqEntry<Job> for ByLink {
//!     fn link(elm: &Job) -> &TailqLink {
//!         &elm.link
//!     }
//!     fn link_mut(elm: &mut Job) -> &mut TailqLink {
//!         &mut elm.link
//!     }
//! }
//!
//! let mut arena = vec![
//!     Job { prio: 1, link: TailqLink::new() },
//!     Job { prio: 2, link: TailqLink::new() },
//! ];
//! let mut q: TailqHead<Job, ByLink> = TailqHead::new();
//! q.insert_tail(&mut arena, RelIdx::from_offset(0));
//! q.insert_tail(&mut arena, RelIdx::from_offset(1));
//! assert_eq!(q.iter(&arena).count(), 2);
//! ```

pub mod circleq;
pub mod list;
pub mod slist;
pub mod stailq;
pub mod tailq;

pub use self::circleq::{CircleqEntry, CircleqHead, CircleqLink};
pub use self::list::{ListEntry, ListHead, ListLink};
pub use self::slist::{SlistEntry, SlistHead, SlistLink};
pub use self::stailq::{StailqEntry, StailqHead, StailqLink};
pub use self::tailq::{TailqEntry, TailqHead, TailqLink};
