pub mod api;
pub mod availability;
pub mod debounce;
pub mod lifecycle;
pub mod payment;
pub mod verification;
pub mod wizard;

#[cfg(test)]
pub mod testing;
