pub(crate) mod dispatcher;
pub(crate) mod notifier;
#[cfg(test)]
pub(crate) mod testing;
pub(crate) mod types;
