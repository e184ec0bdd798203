//! The sign-in view controller.
//!
//! [`AuthFlow`] is an explicit state machine over the sign-in views. The UI
//! renders from [`AuthFlow::snapshot`], feeds user input in as [`Action`]s and
//! follows the returned [`Outcome`]. All identity work is delegated to the
//! [`SessionManager`], the [`RedirectHandler`] and the [`TermsGate`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, ErrorKind};
use crate::redirect::{CallbackOutcome, CallbackParams, RedirectHandler};
use crate::session::{Session, SessionManager, SessionProvider};
use crate::store::{AttemptStore, SessionCache};
use crate::terms::{TermsDecision, TermsGate};
use crate::types::{IdentityProvider, Route, UserAttribute};
use crate::validation::{
    Field, ValidationError, require_terms, validate_code, validate_email, validate_password,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Signup,
    VerifyEmail,
    ForgotPassword,
    EnterOtp,
    TermsUpdate,
}

/// Transient, dismissible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Success(String),
}

/// Everything the UI needs to render the current view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowState {
    pub view: View,
    /// A request is in flight; submit controls are disabled.
    pub busy: bool,
    pub notice: Option<Notice>,
    /// Inline form error.
    pub field_error: Option<ValidationError>,
    /// The user is signed in but blocked on the re-acceptance view.
    pub terms_forced: bool,
    /// Address carried from signup to verification, or from the reset request
    /// to the code entry view.
    pub pending_email: Option<String>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            view: View::Login,
            busy: false,
            notice: None,
            field_error: None,
            terms_forced: false,
            pending_email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Switch views (links and "back" buttons).
    Show(View),
    Login {
        email: String,
        password: String,
    },
    Signup {
        email: String,
        password: String,
        accepted_terms: bool,
    },
    VerifyEmail {
        code: String,
    },
    ResendCode,
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        code: String,
        new_password: String,
    },
    AcceptTerms {
        accepted: bool,
    },
    Federated(IdentityProvider),
    SignOut,
    DismissNotice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Re-render from the snapshot.
    Stay,
    /// Re-render and strip the redirect parameters from the address bar.
    CleanUrl,
    /// Leave the sign-in flow for `route`.
    Navigate(Route),
    /// Dropped: a request is already in flight, the current view does not
    /// allow it, or the controller is unmounted.
    Ignored,
}

/// Clears `busy` when the request ends, even if its future is dropped.
struct BusyGuard<'a> {
    state: &'a Mutex<FlowState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
    }
}

#[derive(Debug)]
pub struct AuthFlow<P, C, A> {
    sessions: SessionManager<P, C>,
    redirect: RedirectHandler<A>,
    gate: TermsGate,
    state: Mutex<FlowState>,
    mounted: AtomicBool,
    /// Bumped on every sign-out; sign-ins started before a bump are dropped.
    sign_outs: AtomicU64,
}

impl<P, C, A> AuthFlow<P, C, A>
where
    P: SessionProvider,
    C: SessionCache,
    A: AttemptStore,
{
    pub fn new(sessions: SessionManager<P, C>, redirect: RedirectHandler<A>, gate: TermsGate) -> Self {
        Self {
            sessions,
            redirect,
            gate,
            state: Mutex::new(FlowState::default()),
            mounted: AtomicBool::new(true),
            sign_outs: AtomicU64::new(0),
        }
    }

    pub fn sessions(&self) -> &SessionManager<P, C> {
        &self.sessions
    }

    pub fn redirect(&self) -> &RedirectHandler<A> {
        &self.redirect
    }

    pub fn gate(&self) -> &TermsGate {
        &self.gate
    }

    pub fn snapshot(&self) -> FlowState {
        self.lock().clone()
    }

    /// Stop applying results of requests that complete from now on.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn generation(&self) -> u64 {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn signed_out_since(&self, generation: u64) -> bool {
        self.generation() != generation
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut FlowState)) {
        if self.is_mounted() {
            f(&mut self.lock());
        }
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        if !self.is_mounted() {
            return None;
        }
        let mut state = self.lock();
        if state.busy {
            return None;
        }
        state.busy = true;
        state.notice = None;
        state.field_error = None;
        Some(BusyGuard { state: &self.state })
    }

    /// Decide the first view when the page loads.
    ///
    /// Completes a federated login if the URL carries one, otherwise resumes
    /// an existing session. Lands on `Login` when neither applies.
    pub async fn start(&self, callback: &CallbackParams) -> Outcome {
        let Some(_busy) = self.try_begin() else {
            return Outcome::Ignored;
        };
        let generation = self.generation();

        match self.redirect.handle_callback(callback).await {
            CallbackOutcome::NoCallback => self.resume_session(generation).await,
            CallbackOutcome::NotAnActiveFlow => {
                self.update(|s| s.view = View::Login);
                Outcome::CleanUrl
            }
            CallbackOutcome::Authenticated(session) => {
                if self.signed_out_since(generation) {
                    tracing::info!(user = %session.user(), "Signed out during federated sign-in, session dropped");
                    return Outcome::Ignored;
                }
                if let Err(e) = self.sessions.adopt(&session) {
                    self.fail(e);
                    return Outcome::CleanUrl;
                }
                match self.after_sign_in(&session) {
                    Outcome::Navigate(route) => Outcome::Navigate(route),
                    _ => Outcome::CleanUrl,
                }
            }
            CallbackOutcome::Failed(_) if self.signed_out_since(generation) => Outcome::Ignored,
            CallbackOutcome::Failed(e) => {
                self.fail(e);
                Outcome::CleanUrl
            }
        }
    }

    async fn resume_session(&self, generation: u64) -> Outcome {
        if self.sessions.current_user().is_none() {
            self.update(|s| s.view = View::Login);
            return Outcome::Stay;
        }
        let resumed = self.sessions.get_session().await;
        if self.signed_out_since(generation) {
            // A refresh may have written the session back.
            self.sessions.sign_out();
            return Outcome::Ignored;
        }
        match resumed {
            Ok(session) => self.after_sign_in(&session),
            Err(e) => {
                tracing::info!(error = %e, "Stored session not resumable");
                self.update(|s| s.view = View::Login);
                Outcome::Stay
            }
        }
    }

    pub async fn dispatch(&self, action: Action) -> Outcome {
        match action {
            Action::DismissNotice => {
                self.update(|s| {
                    s.notice = None;
                    s.field_error = None;
                });
                Outcome::Stay
            }
            Action::Show(view) => self.show(view),
            Action::SignOut => self.sign_out(),
            action => {
                let forced = self.lock().terms_forced;
                if forced && !matches!(action, Action::AcceptTerms { .. }) {
                    return Outcome::Ignored;
                }
                let Some(_busy) = self.try_begin() else {
                    return Outcome::Ignored;
                };
                let generation = self.generation();
                let result = match action {
                    Action::Login { email, password } => {
                        self.login(&email, &password, generation).await
                    }
                    Action::Signup {
                        email,
                        password,
                        accepted_terms,
                    } => self.signup(&email, &password, accepted_terms).await,
                    Action::VerifyEmail { code } => self.verify_email(&code).await,
                    Action::ResendCode => self.resend_code().await,
                    Action::ForgotPassword { email } => self.forgot_password(&email).await,
                    Action::ResetPassword { code, new_password } => {
                        self.reset_password(&code, &new_password).await
                    }
                    Action::AcceptTerms { accepted } => {
                        self.accept_terms(accepted, generation).await
                    }
                    Action::Federated(provider) => Ok(self.federated(&provider)),
                    Action::Show(_) | Action::SignOut | Action::DismissNotice => {
                        Ok(Outcome::Ignored)
                    }
                };
                match result {
                    Ok(outcome) => outcome,
                    Err(_) if self.signed_out_since(generation) => Outcome::Ignored,
                    Err(e) => self.fail(e),
                }
            }
        }
    }

    fn show(&self, view: View) -> Outcome {
        let state = self.lock().clone();
        if state.terms_forced || view == View::TermsUpdate || !self.is_mounted() {
            return Outcome::Ignored;
        }
        self.update(|s| {
            s.view = view;
            s.notice = None;
            s.field_error = None;
        });
        Outcome::Stay
    }

    fn sign_out(&self) -> Outcome {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        let route = self.sessions.sign_out();
        self.redirect.store().clear();
        self.update(|s| *s = FlowState::default());
        Outcome::Navigate(route)
    }

    /// Turn an error into view state. Nothing here is fatal.
    fn fail(&self, error: Error) -> Outcome {
        match error.kind() {
            ErrorKind::Validation => {
                if let Error::Validation(field_error) = error {
                    self.update(|s| s.field_error = Some(field_error));
                }
            }
            ErrorKind::Security => {
                tracing::warn!(error = %error, "Sign-in flow restarted");
                let message = error.user_message();
                self.update(|s| {
                    *s = FlowState::default();
                    s.notice = Some(Notice::Error(message));
                });
            }
            ErrorKind::SessionExpired => {
                self.sessions.sign_out();
                let message = error.user_message();
                self.update(|s| {
                    *s = FlowState::default();
                    s.notice = Some(Notice::Error(message));
                });
            }
            _ => {
                let message = error.user_message();
                self.update(|s| s.notice = Some(Notice::Error(message)));
            }
        }
        Outcome::Stay
    }

    fn succeed(&self, view: View, message: &str) {
        self.update(|s| {
            s.view = view;
            s.notice = Some(Notice::Success(message.to_owned()));
        });
    }

    fn after_sign_in(&self, session: &Session) -> Outcome {
        match self.gate.evaluate(session.claims()) {
            TermsDecision::Proceed => {
                self.update(|s| s.terms_forced = false);
                Outcome::Navigate(Route::Upload)
            }
            TermsDecision::MustReaccept => {
                tracing::info!(user = %session.user(), "Terms re-acceptance required");
                self.update(|s| {
                    s.view = View::TermsUpdate;
                    s.terms_forced = true;
                });
                Outcome::Stay
            }
        }
    }

    fn pending_email(&self) -> Result<String, Error> {
        self.lock().pending_email.clone().ok_or_else(|| {
            ValidationError::new(Field::Email, "Please enter your email address first").into()
        })
    }

    async fn login(&self, email: &str, password: &str, generation: u64) -> Result<Outcome, Error> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::new(Field::Password, "Password is required").into());
        }
        let tokens = self.sessions.provider().sign_in(email, password).await?;
        if self.signed_out_since(generation) {
            tracing::info!("Signed out during password sign-in, session dropped");
            return Ok(Outcome::Ignored);
        }
        let session = self.sessions.establish(tokens)?;
        Ok(self.after_sign_in(&session))
    }

    async fn signup(&self, email: &str, password: &str, accepted_terms: bool) -> Result<Outcome, Error> {
        let email = validate_email(email)?;
        validate_password(password, Field::Password)?;
        require_terms(accepted_terms)?;

        let mut attributes = vec![UserAttribute::new("email", email)];
        attributes.extend(self.gate.acceptance_attributes());
        self.sessions
            .provider()
            .sign_up(email, password, &attributes)
            .await?;

        self.update(|s| s.pending_email = Some(email.to_owned()));
        self.succeed(
            View::VerifyEmail,
            "Account created! Please check your email for verification.",
        );
        Ok(Outcome::Stay)
    }

    async fn verify_email(&self, code: &str) -> Result<Outcome, Error> {
        let code = validate_code(code)?;
        let email = self.pending_email()?;
        self.sessions.provider().confirm_sign_up(&email, code).await?;
        self.succeed(View::Login, "Email verified successfully! You can now login.");
        Ok(Outcome::Stay)
    }

    async fn resend_code(&self) -> Result<Outcome, Error> {
        let email = self.pending_email()?;
        self.sessions.provider().resend_confirmation_code(&email).await?;
        self.update(|s| s.notice = Some(Notice::Success("New verification code sent!".into())));
        Ok(Outcome::Stay)
    }

    async fn forgot_password(&self, email: &str) -> Result<Outcome, Error> {
        let email = validate_email(email)?;
        self.sessions.provider().forgot_password(email).await?;
        self.update(|s| s.pending_email = Some(email.to_owned()));
        self.succeed(View::EnterOtp, "Password reset code sent to your email!");
        Ok(Outcome::Stay)
    }

    async fn reset_password(&self, code: &str, new_password: &str) -> Result<Outcome, Error> {
        let code = validate_code(code)?;
        validate_password(new_password, Field::NewPassword)?;
        let email = self.pending_email()?;
        self.sessions
            .provider()
            .confirm_forgot_password(&email, code, new_password)
            .await?;
        self.update(|s| s.pending_email = None);
        self.succeed(View::Login, "Password reset successfully! You can now login.");
        Ok(Outcome::Stay)
    }

    async fn accept_terms(&self, accepted: bool, generation: u64) -> Result<Outcome, Error> {
        require_terms(accepted)?;
        let session = self.sessions.get_session().await?;

        self.sessions
            .provider()
            .update_attributes(&session.tokens().access_token, &self.gate.acceptance_attributes())
            .await
            .map_err(|e| match e.provider_code() {
                Some("NotAuthorizedException") => Error::SessionExpired,
                _ => e,
            })?;

        // The identity token only shows the new attributes after a refresh.
        let session = self.sessions.refresh().await?;
        if self.signed_out_since(generation) {
            self.sessions.sign_out();
            return Ok(Outcome::Ignored);
        }
        if self.gate.evaluate(session.claims()) == TermsDecision::MustReaccept {
            tracing::warn!(user = %session.user(), "Refreshed token does not show terms acceptance yet");
        }
        tracing::info!(user = %session.user(), version = self.gate.current_version(), "Terms accepted");
        self.update(|s| s.terms_forced = false);
        Ok(Outcome::Navigate(Route::Upload))
    }

    fn federated(&self, provider: &IdentityProvider) -> Outcome {
        let url = self.redirect.begin_federated_login(provider);
        Outcome::Navigate(Route::External(url))
    }
}
