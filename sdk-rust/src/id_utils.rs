use rand::{distributions::Alphanumeric, Rng};

/// Random alphanumeric identifier, used where a provider omits tool call ids.
pub fn generate_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    #[test]
    fn generates_requested_length() {
        let id = super::generate_string(10);
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
