/// Scoped environment-variable mutation. Each touched variable is restored
/// to its pre-test value when the guard drops.
pub struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    pub fn new() -> Self {
        Self { saved: Vec::new() }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.save_once(key);
        std::env::set_var(key, value);
    }

    #[allow(dead_code)]
    pub fn remove(&mut self, key: &str) {
        self.save_once(key);
        std::env::remove_var(key);
    }

    fn save_once(&mut self, key: &str) {
        if self.saved.iter().any(|(k, _)| k == key) {
            return;
        }
        self.saved.push((key.to_string(), std::env::var(key).ok()));
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            match previous {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}
