//! Wire schema and frame codec for host-plugin communication.
//!
//! The `girder-wire` crate defines the vocabulary both sides of the plugin
//! boundary speak: the flattened, ID-based package graph the host sends to a
//! plugin, the command and diagnostic records a plugin sends back, and the
//! message envelopes carrying them. It also implements the length-prefixed
//! framing used on the stdio pipes.
//!
//! Cross-references in the flattened graph are small non-negative integers
//! assigned in serialization order. An ID is only meaningful within the
//! [`PluginInput`] that carries it; no in-process references ever cross the
//! process boundary.
//!
//! Every polymorphic case carries an explicit discriminator field, and
//! decoding rejects unknown discriminators so protocol violations surface as
//! malformed-message errors rather than silent misinterpretation.

pub mod command;
pub mod diagnostic;
pub mod frame;
pub mod input;
pub mod message;

pub use command::{BuildCommand, CommandConfiguration, PrebuildCommand};
pub use diagnostic::{Diagnostic, DiagnosticSeverity};
pub use frame::{FrameError, read_frame, read_message, write_frame, write_message};
pub use input::{
    LibraryKind, PackageId, PathId, PluginAction, PluginInput, ProductId, TargetId, WireDependency,
    WireFile, WireFileKind, WirePackage, WirePath, WireProduct, WireProductInfo, WireTarget,
    WireTargetInfo,
};
pub use message::{HostToPluginMessage, PluginToHostMessage};
