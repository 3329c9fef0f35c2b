//! Cross-component flows through the public API of the controller crate.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod concurrency;
#[cfg(test)]
mod decision_flows;
#[cfg(test)]
mod json_store;
