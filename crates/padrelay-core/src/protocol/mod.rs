//! Protocol module containing the state record, the binary codec, and
//! sequence-number handling.

pub mod codec;
pub mod record;
pub mod sequence;

pub use codec::{CodecError, StateCodec};
pub use record::{StateRecord, WireLayout};
pub use sequence::{SequenceCounter, SequenceGate};
