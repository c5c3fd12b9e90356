#![forbid(unsafe_code)]

pub mod archive;
pub mod decode;
pub mod engine;
pub mod error;
pub mod layout;
pub mod node;
pub mod present;
pub mod title;

pub use archive::{ArchiveSource, ArchiveStream, EntryInfo, EntryStream, ZipSource};
pub use decode::{DecodedImage, ImageDecoder, ImageRsDecoder};
pub use engine::{Navigator, NavigatorConfig};
pub use error::{PageflipError, PageflipResult};
pub use layout::{Placement, Viewport, plan_page};
pub use node::{ContainerNode, LeafImage, Node, PageNode, SourceListNode};
pub use present::{LinePresenter, NavCommand, PageView, Presenter};
pub use title::compose_title;
