use bizflow_model::OwnerId;

/// The session collaborator: exposes the current owner, if any.
///
/// While `is_loading` is true the owner is not yet known and consumers
/// should neither load nor subscribe.
pub trait Session {
    fn owner(&self) -> Option<OwnerId>;

    fn is_loading(&self) -> bool {
        false
    }
}

/// A session whose state is set explicitly, e.g. from a CLI flag.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    owner: Option<OwnerId>,
    loading: bool,
}

impl StaticSession {
    pub fn signed_in(owner: impl Into<OwnerId>) -> Self {
        Self {
            owner: Some(owner.into()),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            owner: None,
            loading: true,
        }
    }

    pub fn sign_in(&mut self, owner: impl Into<OwnerId>) {
        self.owner = Some(owner.into());
        self.loading = false;
    }

    pub fn sign_out(&mut self) {
        self.owner = None;
        self.loading = false;
    }
}

impl Session for StaticSession {
    fn owner(&self) -> Option<OwnerId> {
        if self.loading {
            None
        } else {
            self.owner.clone()
        }
    }

    fn is_loading(&self) -> bool {
        self.loading
    }
}
