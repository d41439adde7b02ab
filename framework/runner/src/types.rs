/// Recommended error type for scenario `main` functions, hooks and steps. This type is compatible
/// with [crate::definition::HookResult] so you can use `?` to propagate errors.
pub type HarnessResult<T> = anyhow::Result<T>;
