use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::Session;

/// Hardware providers to try before ort's built-in CPU provider.
fn accelerators() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    return vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];

    #[cfg(target_os = "windows")]
    return vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    Vec::new()
}

/// Opens one face model. A provider that fails to register is skipped and
/// the model runs on the CPU.
pub fn build_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::builder()?
        .with_execution_providers(accelerators())?
        .commit_from_file(model_path)?;
    Ok(session)
}
