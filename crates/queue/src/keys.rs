//! Store key layout.
//!
//! ```text
//! {ns}:idle:{worker}       idle lease, TTL = idle TTL
//! {ns}:pending:{worker}    pending lease, TTL = pending TTL
//! {ns}:queue               ordered list of request ids
//! {ns}:request:{id}        request metadata (JSON), TTL = meta TTL
//! {ns}:lock:processing     processing lock
//! ```

#[derive(Debug, Clone)]
pub struct KeySpace {
    ns: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            ns: namespace.into(),
        }
    }

    pub fn idle_prefix(&self) -> String {
        format!("{}:idle:", self.ns)
    }

    pub fn idle(&self, worker_id: &str) -> String {
        format!("{}:idle:{worker_id}", self.ns)
    }

    pub fn pending(&self, worker_id: &str) -> String {
        format!("{}:pending:{worker_id}", self.ns)
    }

    pub fn queue(&self) -> String {
        format!("{}:queue", self.ns)
    }

    pub fn request(&self, request_id: &str) -> String {
        format!("{}:request:{request_id}", self.ns)
    }

    pub fn processing_lock(&self) -> String {
        format!("{}:lock:processing", self.ns)
    }

    /// Recover the worker id from an idle lease key.
    ///
    /// Worker ids may themselves contain `:`; everything after the prefix
    /// is the id.
    pub fn worker_from_idle<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.idle_prefix())
            .filter(|id| !id.is_empty())
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("recorder")
    }
}
