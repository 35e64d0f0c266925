mod process;
mod protocol;

use std::io::{Read, Write};

use crate::params::SignatureSpec;

pub use process::ProcessEngine;
pub use protocol::{EngineReply, EngineRequest, read_frame, read_message, write_frame, write_message};

/// Embeds a visible digital signature into a PDF.
///
/// Implementations are sync and always run on a blocking worker. The writer
/// receives the complete signed document, encrypted when `spec.password` is set.
pub trait PdfSigningEngine: Send + Sync {
    fn sign(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        spec: &SignatureSpec<'_>,
    ) -> anyhow::Result<()>;

    /// Engine identifier for logs (e.g. "process").
    fn name(&self) -> &str;
}
