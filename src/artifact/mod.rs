//! Build artifacts: content hashing, decompression and retrieval.

mod codec;
mod hash;
mod source;
mod types;

pub use codec::{Codec, GzipCodec, NoneCodec};
pub use hash::ArtifactHasher;
pub use source::{ArtifactSource, DEFAULT_ARTIFACT_URL, HttpArtifactSource};
pub use types::{Artifact, ArtifactVariant};
