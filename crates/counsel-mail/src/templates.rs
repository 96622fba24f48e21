//! The two transactional templates: verification and welcome.

use crate::Email;

pub fn verification_email(to: &str, username: &str, verification_url: &str) -> Email {
    let html = format!(
        "<html><body>\
         <h2>Verify your email address</h2>\
         <p>Hi {username},</p>\
         <p>Thanks for signing up. Please confirm your email address by \
         clicking the link below. The link is valid for 7 days.</p>\
         <p><a href=\"{verification_url}\">{verification_url}</a></p>\
         <p>If you did not create this account, you can ignore this email.</p>\
         </body></html>"
    );

    Email::new(to, "Verify your email address", html)
}

pub fn welcome_email(to: &str, username: &str) -> Email {
    let html = format!(
        "<html><body>\
         <h2>Welcome, {username}!</h2>\
         <p>Your email address has been verified and your account is now \
         active. You can log in and start asking questions.</p>\
         </body></html>"
    );

    Email::new(to, "Welcome to Counsel!", html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_carries_the_link() {
        let email = verification_email(
            "asha@example.com",
            "asha",
            "https://app.example.com/verify-email/tok-123",
        );
        assert_eq!(email.to, "asha@example.com");
        assert!(email.html.contains("/verify-email/tok-123"));
        assert!(email.text.contains("/verify-email/tok-123"));
    }

    #[test]
    fn welcome_email_addresses_the_user() {
        let email = welcome_email("asha@example.com", "asha");
        assert!(email.html.contains("Welcome, asha!"));
        assert!(!email.text.contains('<'));
    }
}
