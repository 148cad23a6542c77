//! Text markers on the challenge page that the flows key off. The form is a
//! Bubble app, so its framework classes are the only stable handles; the
//! class selectors themselves live next to the scripts that walk them.

/// Bubble popup container. Modals and the reCAPTCHA interstitial render here.
pub const POPUP: &str = "div.bubble-element.Popup";
/// The one actionable control inside the reCAPTCHA popup.
pub const POPUP_BUTTON: &str = "button.bubble-element.Button";
/// Literal text that identifies the reCAPTCHA popup.
pub const CAPTCHA_MARKER: &str = "Get through this reCAPTCHA to continue";

/// Landing-page button that opens the signup modal. The same label starts a
/// round once logged in.
pub const START_BUTTON: &str = "Start";
/// Switches the signup modal to the login form. Matched exactly: the modal
/// also offers "SIGN UP OR LOGIN WITH GOOGLE".
pub const OR_LOGIN_BUTTON: &str = "OR LOGIN";
pub const LOG_IN_BUTTON: &str = "LOG IN";
pub const SUBMIT_BUTTON: &str = "Submit";

pub const EMAIL_PLACEHOLDER: &str = "Email";
pub const PASSWORD_PLACEHOLDER: &str = "Password";
