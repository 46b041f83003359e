//! Outbound transactional email.
//!
//! Carries the one-time login code and the password-reset link to the
//! account's address over SMTP. Delivery failures surface as
//! `ExternalService` errors; retries, if any, belong to the transport.

use crate::config::EmailConfig;
use crate::errors::{ServiceError, ServiceResult};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new EmailService instance
    pub fn new(config: EmailConfig) -> ServiceResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ServiceError::validation(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, config })
    }

    /// Sends the login verification code to the account's email address.
    pub async fn send_otp_email(&self, recipient_email: &str, code: &str) -> ServiceResult<()> {
        let subject = "Login Verification OTP";
        let html_content = self.build_otp_html(code);
        let text_content = format!(
            "Your login verification code is {code}. It expires in 10 minutes.\n\
             If you did not request this code, please ignore this email.\n"
        );

        self.send_email(recipient_email, subject, &html_content, &text_content)
            .await
    }

    /// Sends the password-reset link embedding the capability token.
    pub async fn send_reset_email(&self, recipient_email: &str, reset_url: &str) -> ServiceResult<()> {
        let subject = "Reset Password";
        let html_content = self.build_reset_html(reset_url);
        let text_content = format!(
            "We received a password reset request for your account.\n\
             Open the link below to choose a new password:\n{reset_url}\n\n\
             This link expires in 60 minutes. If you did not request a reset,\n\
             no further action is required.\n"
        );

        self.send_email(recipient_email, subject, &html_content, &text_content)
            .await
    }

    /// Sends a generic email
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> ServiceResult<()> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.config.from_name, self.config.from_email
        ))
        .map_err(|e| ServiceError::validation(format!("Invalid from email: {e}")))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| ServiceError::validation(format!("Invalid recipient email: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_content.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_content.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::validation(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| ServiceError::external_service(format!("Failed to send email: {e}")))?;

        Ok(())
    }

    fn build_otp_html(&self, code: &str) -> String {
        format!(
            r#"
            <div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; background-color: #f0f0f0; padding: 20px;">
              <div style="background-color: white; padding: 20px; border-radius: 5px;">
                <h2 style="color: #2c3e50;">Hello!</h2>
                <p>You are receiving this email because we received a login verification request for your account.</p>
                <div style="text-align: center; margin: 20px 0;">
                  <p style="font-size: 24px; font-weight: bold;">Your OTP: <span style="color: #231f20;">{}</span></p>
                </div>
                <p>This OTP will expire in 10 minutes.</p>
                <p>If you did not request this OTP, please ignore this email.</p>
                <p>Regards,<br>{}</p>
              </div>
              <p style="font-size: 12px; color: #666; margin-top: 10px;">This is an automated message, please do not reply.</p>
            </div>
            "#,
            code, self.config.from_name
        )
    }

    fn build_reset_html(&self, reset_url: &str) -> String {
        format!(
            r#"
            <div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; background-color: #f0f0f0; padding: 20px;">
              <div style="background-color: white; padding: 20px; border-radius: 5px;">
                <h2 style="color: #2c3e50;">Hello!</h2>
                <p>You are receiving this email because we received a password reset request for your account.</p>
                <div style="text-align: center; margin: 20px 0;">
                  <a href="{}" style="background-color: #3498db; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; display: inline-block;">Reset Password</a>
                </div>
                <p>This password reset link will expire in 60 minutes.</p>
                <p>If you did not request a password reset, no further action is required.</p>
                <p>Regards,<br>{}</p>
              </div>
              <p style="font-size: 12px; color: #666; margin-top: 10px;">If you're having trouble clicking the "Reset Password" button, copy and paste the URL into your web browser.</p>
            </div>
            "#,
            reset_url, self.config.from_name
        )
    }
}
