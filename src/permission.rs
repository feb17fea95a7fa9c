//! Microphone permission gate.
//!
//! Desktop hosts grant access at the OS level, so the built-in gate is static;
//! denial is still modelled so the session policy can be exercised.

/// Callback invoked with the outcome of a permission request.
pub type PermissionCallback = Box<dyn FnOnce(bool) + Send>;

pub trait PermissionGate {
    fn has_microphone_permission(&self) -> bool;

    /// Ask for access; `callback` receives `true` when granted. Implementations
    /// may invoke it before returning.
    fn request_microphone_permission(&self, callback: PermissionCallback);
}

/// Gate with a fixed answer, chosen at startup.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    granted: bool,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self { granted: true }
    }

    pub fn denied() -> Self {
        Self { granted: false }
    }
}

impl PermissionGate for StaticPermission {
    fn has_microphone_permission(&self) -> bool {
        self.granted
    }

    fn request_microphone_permission(&self, callback: PermissionCallback) {
        callback(self.granted);
    }
}

/// Check the gate and, if needed, request access. Returns the final answer.
pub fn ensure_microphone_permission(gate: &dyn PermissionGate) -> bool {
    if gate.has_microphone_permission() {
        return true;
    }
    let (tx, rx) = crossbeam_channel::bounded(1);
    gate.request_microphone_permission(Box::new(move |granted| {
        let _ = tx.send(granted);
    }));
    // A gate that drops the callback without answering counts as a refusal.
    rx.recv().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PromptingGate {
        answer: bool,
        prompts: AtomicUsize,
    }

    impl PermissionGate for PromptingGate {
        fn has_microphone_permission(&self) -> bool {
            false
        }

        fn request_microphone_permission(&self, callback: PermissionCallback) {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            callback(self.answer);
        }
    }

    struct SilentGate;

    impl PermissionGate for SilentGate {
        fn has_microphone_permission(&self) -> bool {
            false
        }

        fn request_microphone_permission(&self, _callback: PermissionCallback) {}
    }

    #[test]
    fn granted_gate_skips_prompt() {
        assert!(ensure_microphone_permission(&StaticPermission::granted()));
    }

    #[test]
    fn denied_gate_reports_false() {
        assert!(!ensure_microphone_permission(&StaticPermission::denied()));
    }

    #[test]
    fn prompt_answer_is_used() {
        let gate = PromptingGate {
            answer: true,
            prompts: AtomicUsize::new(0),
        };
        assert!(ensure_microphone_permission(&gate));
        assert_eq!(gate.prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_callback_counts_as_denied() {
        assert!(!ensure_microphone_permission(&SilentGate));
    }
}
