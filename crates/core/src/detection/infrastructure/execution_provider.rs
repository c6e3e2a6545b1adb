use ort::execution_providers::ExecutionProviderDispatch;

/// Hardware execution providers to try for ONNX sessions on this platform.
///
/// ONNX Runtime falls back to CPU when none of them registers, so an empty
/// list means plain CPU inference.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();

    log::debug!("ONNX execution providers requested: {}", providers.len());
    providers
}
