//! End-to-end discovery runs against a simulated network.

#[cfg(test)]
mod support;

#[cfg(test)]
mod discovery {
    mod integration;
}
