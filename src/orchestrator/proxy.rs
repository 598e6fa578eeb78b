//! Round-robin proxy selection, advanced once per completed batch.

#[derive(Debug, Clone, Default)]
pub struct ProxyRotator {
    proxies: Vec<String>,
    idx: usize,
}

impl ProxyRotator {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { proxies, idx: 0 }
    }

    /// The proxy for the current batch, `None` when no proxies are configured.
    pub fn current(&self) -> Option<&str> {
        self.proxies.get(self.idx).map(String::as_str)
    }

    pub fn advance(&mut self) {
        if self.proxies.is_empty() {
            return;
        }
        self.idx = (self.idx + 1) % self.proxies.len();
    }

    /// Index for snapshots: -1 when no proxies are configured.
    pub fn index(&self) -> i64 {
        if self.proxies.is_empty() {
            -1
        } else {
            self.idx as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_yields_none() {
        let mut rotator = ProxyRotator::new(vec![]);
        assert_eq!(rotator.current(), None);
        rotator.advance();
        assert_eq!(rotator.current(), None);
        assert_eq!(rotator.index(), -1);
    }

    #[test]
    fn index_after_k_advances_is_k_mod_p() {
        let proxies: Vec<String> = ["p0", "p1", "p2"].iter().map(|s| s.to_string()).collect();
        let mut rotator = ProxyRotator::new(proxies);
        for k in 0..10usize {
            assert_eq!(rotator.index(), (k % 3) as i64);
            assert_eq!(rotator.current(), Some(format!("p{}", k % 3).as_str()));
            rotator.advance();
        }
    }
}
