//! Session binding for one view's attach/detach cycle.

use crate::session::error::{SessionError, SessionResult, SessionState};
use crate::session::Session;
use crate::store::DocumentStore;
use log::debug;

/// Owns at most one open [`Session`] on behalf of a view.
///
/// `open` on attach, `release` on detach. After release the next `open`
/// starts a fresh session; an open session is reused as-is.
pub struct ViewSession<'store> {
    store: &'store DocumentStore,
    session: Option<Session<'store>>,
}

impl<'store> ViewSession<'store> {
    pub fn new(store: &'store DocumentStore) -> Self {
        Self {
            store,
            session: None,
        }
    }

    pub fn open(&mut self) -> SessionResult<&mut Session<'store>> {
        let reusable = self
            .session
            .as_ref()
            .is_some_and(|session| session.state() != SessionState::Closed);
        if !reusable {
            self.session = Some(Session::new(self.store));
        }

        let session = self
            .session
            .as_mut()
            .ok_or(SessionError::NotOpen(SessionState::Unopened))?;
        session.open()?;
        Ok(session)
    }

    /// Closes the current session, discarding unsaved work.
    pub fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!(
                "event=view_release module=service status=ok session_id={}",
                session.id()
            );
            session.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_open)
    }

    /// The open session; `NotOpen` when the view is detached.
    pub fn session(&mut self) -> SessionResult<&mut Session<'store>> {
        match self.session.as_mut() {
            Some(session) if session.is_open() => Ok(session),
            Some(session) => Err(SessionError::NotOpen(session.state())),
            None => Err(SessionError::NotOpen(SessionState::Unopened)),
        }
    }
}

impl Drop for ViewSession<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
