//! Utility macros for reducing boilerplate

/// Implement `FromRef<AppState>` for a state field.
///
/// ```ignore
/// impl_from_ref!(SharedStore, store);
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
