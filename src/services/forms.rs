//! Public forms: estimation wizard and contact form
//!
//! The wizard has four steps. The front-end posts the whole draft to
//! `validate_step` before moving on, then submits everything at once.
//! Submissions are checked against reCAPTCHA and mailed to the agency with
//! the prospect as reply-to; nothing is stored.

use crate::models::{ContactMessage, EstimationDraft, FieldError};
use crate::services::captcha::{CaptchaOutcome, CaptchaVerifier};
use crate::services::mail::MailService;
use crate::services::validation::{char_len, is_valid_email, is_valid_phone, normalize_optional};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tera::Context as TeraContext;

pub const STEP_COUNT: u8 = 4;
pub const MAX_FEATURES: usize = 20;
pub const MAX_DETAILS_LEN: usize = 2000;
pub const MAX_MESSAGE_LEN: usize = 5000;
const MAX_NAME_LEN: usize = 120;
const MAX_COMPANY_LEN: usize = 200;
const MAX_SUBJECT_LEN: usize = 200;
const MIN_CONTACT_MESSAGE_LEN: usize = 10;

/// A selectable option of the wizard
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Choice {
    pub key: &'static str,
    pub label: &'static str,
}

const fn choice(key: &'static str, label: &'static str) -> Choice {
    Choice { key, label }
}

pub const PROJECT_TYPES: &[Choice] = &[
    choice("showcase", "Showcase website"),
    choice("ecommerce", "Online shop"),
    choice("web_app", "Web application"),
    choice("mobile_app", "Mobile application"),
    choice("redesign", "Redesign of an existing site"),
    choice("other", "Other"),
];

pub const FEATURES: &[Choice] = &[
    choice("contact_form", "Contact form"),
    choice("blog", "Blog / news"),
    choice("multilingual", "Multilingual content"),
    choice("cms", "Content management"),
    choice("seo", "SEO optimisation"),
    choice("analytics", "Analytics"),
    choice("newsletter", "Newsletter"),
    choice("user_accounts", "User accounts"),
    choice("online_payment", "Online payment"),
    choice("booking", "Booking / appointments"),
    choice("catalog", "Product catalog"),
    choice("search", "Search"),
    choice("maps", "Maps / store locator"),
    choice("chat", "Live chat"),
    choice("gallery", "Photo gallery"),
    choice("api_integration", "Third-party integrations"),
    choice("admin_dashboard", "Admin dashboard"),
    choice("notifications", "Notifications"),
    choice("accessibility", "Accessibility audit"),
    choice("hosting", "Hosting and maintenance"),
];

pub const BUDGETS: &[Choice] = &[
    choice("lt_2k", "Less than 2 000 €"),
    choice("2k_5k", "2 000 € to 5 000 €"),
    choice("5k_10k", "5 000 € to 10 000 €"),
    choice("10k_20k", "10 000 € to 20 000 €"),
    choice("gt_20k", "More than 20 000 €"),
    choice("unknown", "Not defined yet"),
];

pub const TIMELINES: &[Choice] = &[
    choice("asap", "As soon as possible"),
    choice("1_month", "Within a month"),
    choice("1_3_months", "1 to 3 months"),
    choice("3_6_months", "3 to 6 months"),
    choice("flexible", "Flexible"),
];

/// All wizard options, served to the front-end
#[derive(Debug, Clone, Serialize)]
pub struct EstimationOptions {
    pub steps: u8,
    pub project_types: &'static [Choice],
    pub features: &'static [Choice],
    pub budgets: &'static [Choice],
    pub timelines: &'static [Choice],
}

pub fn options() -> EstimationOptions {
    EstimationOptions {
        steps: STEP_COUNT,
        project_types: PROJECT_TYPES,
        features: FEATURES,
        budgets: BUDGETS,
        timelines: TIMELINES,
    }
}

fn label_of(catalog: &[Choice], key: &str) -> Option<&'static str> {
    catalog.iter().find(|c| c.key == key).map(|c| c.label)
}

#[derive(Debug, thiserror::Error)]
pub enum FormsServiceError {
    #[error("Invalid form submission")]
    Invalid(Vec<FieldError>),

    #[error("Failed to send message: {0}")]
    MailError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Field errors of one wizard step. `today` bounds the desired start date.
pub fn validate_step(step: u8, draft: &EstimationDraft, today: NaiveDate) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match step {
        1 => match draft.project_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => errors.push(FieldError::new("project_type", "Please choose a project type")),
            Some(key) if label_of(PROJECT_TYPES, key).is_none() => {
                errors.push(FieldError::new("project_type", "Unknown project type"))
            }
            Some(_) => {}
        },
        2 => {
            if draft.features.len() > MAX_FEATURES {
                errors.push(FieldError::new(
                    "features",
                    format!("At most {} features can be selected", MAX_FEATURES),
                ));
            }
            if let Some(unknown) = draft.features.iter().find(|f| label_of(FEATURES, f).is_none()) {
                errors.push(FieldError::new("features", format!("Unknown feature '{}'", unknown)));
            }
            if draft
                .feature_details
                .as_deref()
                .is_some_and(|d| char_len(d) > MAX_DETAILS_LEN)
            {
                errors.push(FieldError::new(
                    "feature_details",
                    format!("At most {} characters", MAX_DETAILS_LEN),
                ));
            }
        }
        3 => {
            match draft.budget.as_deref() {
                None | Some("") => errors.push(FieldError::new("budget", "Please choose a budget")),
                Some(key) if label_of(BUDGETS, key).is_none() => {
                    errors.push(FieldError::new("budget", "Unknown budget range"))
                }
                Some(_) => {}
            }
            match draft.timeline.as_deref() {
                None | Some("") => errors.push(FieldError::new("timeline", "Please choose a timeline")),
                Some(key) if label_of(TIMELINES, key).is_none() => {
                    errors.push(FieldError::new("timeline", "Unknown timeline"))
                }
                Some(_) => {}
            }
            if draft.start_date.is_some_and(|date| date < today) {
                errors.push(FieldError::new("start_date", "The start date cannot be in the past"));
            }
        }
        4 => {
            validate_name(&mut errors, &draft.name);
            validate_email(&mut errors, &draft.email);
            if let Some(phone) = draft.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                if !is_valid_phone(phone) {
                    errors.push(FieldError::new("phone", "Invalid phone number"));
                }
            }
            if draft
                .company
                .as_deref()
                .is_some_and(|c| char_len(c.trim()) > MAX_COMPANY_LEN)
            {
                errors.push(FieldError::new("company", format!("At most {} characters", MAX_COMPANY_LEN)));
            }
            if draft.message.as_deref().is_some_and(|m| char_len(m) > MAX_MESSAGE_LEN) {
                errors.push(FieldError::new("message", format!("At most {} characters", MAX_MESSAGE_LEN)));
            }
            if !draft.consent {
                errors.push(FieldError::new("consent", "Consent is required to be contacted"));
            }
        }
        _ => errors.push(FieldError::new(
            "step",
            format!("Step must be between 1 and {}", STEP_COUNT),
        )),
    }
    errors
}

/// Field errors of every step
pub fn validate_all(draft: &EstimationDraft, today: NaiveDate) -> Vec<FieldError> {
    (1..=STEP_COUNT)
        .flat_map(|step| validate_step(step, draft, today))
        .collect()
}

pub fn validate_contact(message: &ContactMessage) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_name(&mut errors, &message.name);
    validate_email(&mut errors, &message.email);
    if message
        .subject
        .as_deref()
        .is_some_and(|s| char_len(s.trim()) > MAX_SUBJECT_LEN)
    {
        errors.push(FieldError::new("subject", format!("At most {} characters", MAX_SUBJECT_LEN)));
    }
    let len = char_len(message.message.trim());
    if len < MIN_CONTACT_MESSAGE_LEN {
        errors.push(FieldError::new(
            "message",
            format!("Please write at least {} characters", MIN_CONTACT_MESSAGE_LEN),
        ));
    } else if len > MAX_MESSAGE_LEN {
        errors.push(FieldError::new("message", format!("At most {} characters", MAX_MESSAGE_LEN)));
    }
    errors
}

fn validate_name(errors: &mut Vec<FieldError>, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    } else if char_len(name) > MAX_NAME_LEN {
        errors.push(FieldError::new("name", format!("At most {} characters", MAX_NAME_LEN)));
    }
}

fn validate_email(errors: &mut Vec<FieldError>, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

pub struct FormsService {
    captcha: Arc<dyn CaptchaVerifier>,
    mail: Arc<MailService>,
}

impl FormsService {
    pub fn new(captcha: Arc<dyn CaptchaVerifier>, mail: Arc<MailService>) -> Self {
        Self { captcha, mail }
    }

    pub fn captcha_enabled(&self) -> bool {
        self.captcha.is_enabled()
    }

    /// Validate a single wizard step against today's date
    pub fn validate_step(&self, step: u8, draft: &EstimationDraft) -> Vec<FieldError> {
        validate_step(step, draft, Utc::now().date_naive())
    }

    pub async fn submit_estimation(
        &self,
        draft: EstimationDraft,
        captcha_token: Option<&str>,
        remote_ip: Option<IpAddr>,
    ) -> Result<(), FormsServiceError> {
        let errors = validate_all(&draft, Utc::now().date_naive());
        if !errors.is_empty() {
            return Err(FormsServiceError::Invalid(errors));
        }
        self.check_captcha(captcha_token, remote_ip).await?;

        let mut features: Vec<&str> = Vec::new();
        for key in &draft.features {
            if let Some(label) = label_of(FEATURES, key) {
                if !features.contains(&label) {
                    features.push(label);
                }
            }
        }
        let draft = EstimationDraft {
            name: trimmed(&draft.name),
            email: trimmed(&draft.email),
            phone: normalize_optional(draft.phone),
            company: normalize_optional(draft.company),
            message: normalize_optional(draft.message),
            feature_details: normalize_optional(draft.feature_details),
            ..draft
        };

        let mut context = TeraContext::new();
        context.insert(
            "project_type",
            draft.project_type.as_deref().and_then(|k| label_of(PROJECT_TYPES, k)).unwrap_or_default(),
        );
        context.insert("features", &features);
        context.insert(
            "budget",
            draft.budget.as_deref().and_then(|k| label_of(BUDGETS, k)).unwrap_or_default(),
        );
        context.insert(
            "timeline",
            draft.timeline.as_deref().and_then(|k| label_of(TIMELINES, k)).unwrap_or_default(),
        );
        context.insert("draft", &draft);

        self.mail
            .notify_agency("estimation.txt", &context, Some(&draft.email))
            .await
            .map_err(|e| {
                tracing::warn!("Failed to send estimation request: {:#}", e);
                FormsServiceError::MailError(e.to_string())
            })?;
        tracing::info!(project_type = ?draft.project_type, budget = ?draft.budget, "estimation request sent");
        Ok(())
    }

    pub async fn submit_contact(
        &self,
        message: ContactMessage,
        remote_ip: Option<IpAddr>,
    ) -> Result<(), FormsServiceError> {
        let errors = validate_contact(&message);
        if !errors.is_empty() {
            return Err(FormsServiceError::Invalid(errors));
        }
        self.check_captcha(message.captcha_token.as_deref(), remote_ip).await?;

        let message = ContactMessage {
            name: trimmed(&message.name),
            email: trimmed(&message.email),
            subject: normalize_optional(message.subject),
            message: trimmed(&message.message),
            captcha_token: None,
        };
        let mut context = TeraContext::new();
        context.insert("message", &message);

        self.mail
            .notify_agency("contact.txt", &context, Some(&message.email))
            .await
            .map_err(|e| {
                tracing::warn!("Failed to send contact message: {:#}", e);
                FormsServiceError::MailError(e.to_string())
            })?;
        tracing::info!("contact message sent");
        Ok(())
    }

    async fn check_captcha(&self, token: Option<&str>, remote_ip: Option<IpAddr>) -> Result<(), FormsServiceError> {
        let outcome = match self.captcha.verify(token, remote_ip).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Captcha verification failed: {:#}", e);
                CaptchaOutcome::Rejected
            }
        };
        match outcome {
            CaptchaOutcome::Passed => Ok(()),
            CaptchaOutcome::Rejected => Err(FormsServiceError::Invalid(vec![FieldError::new(
                "captcha_token",
                "Captcha verification failed, please try again",
            )])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailConfig, SiteConfig};
    use crate::services::captcha::StaticCaptcha;
    use crate::services::mail::MemoryMailer;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn complete_draft() -> EstimationDraft {
        EstimationDraft {
            project_type: Some("ecommerce".to_string()),
            features: vec!["online_payment".to_string(), "catalog".to_string()],
            feature_details: Some("Paiement en trois fois".to_string()),
            budget: Some("5k_10k".to_string()),
            timeline: Some("1_3_months".to_string()),
            start_date: None,
            name: " Léa Martin ".to_string(),
            email: "lea@example.com".to_string(),
            phone: Some("+33 6 12 34 56 78".to_string()),
            company: None,
            message: None,
            consent: true,
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    fn service(outcome: CaptchaOutcome) -> (FormsService, Arc<MemoryMailer>) {
        let mailer = Arc::new(MemoryMailer::new());
        let mail = MailService::new(
            mailer.clone(),
            &MailConfig { notify_to: "agency@example.com".to_string(), ..Default::default() },
            &SiteConfig::default(),
        )
        .unwrap();
        (FormsService::new(Arc::new(StaticCaptcha(outcome)), Arc::new(mail)), mailer)
    }

    #[test]
    fn test_step_one() {
        let draft = EstimationDraft::default();
        assert_eq!(fields(&validate_step(1, &draft, today())), vec!["project_type"]);

        let draft = EstimationDraft { project_type: Some("castle".into()), ..Default::default() };
        assert_eq!(fields(&validate_step(1, &draft, today())), vec!["project_type"]);

        let draft = EstimationDraft { project_type: Some("web_app".into()), ..Default::default() };
        assert!(validate_step(1, &draft, today()).is_empty());
    }

    #[test]
    fn test_step_two() {
        // No feature is fine
        assert!(validate_step(2, &EstimationDraft::default(), today()).is_empty());

        let draft = EstimationDraft { features: vec!["teleport".into()], ..Default::default() };
        assert_eq!(fields(&validate_step(2, &draft, today())), vec!["features"]);

        let draft = EstimationDraft {
            features: vec!["blog".into(); MAX_FEATURES + 1],
            feature_details: Some("x".repeat(MAX_DETAILS_LEN + 1)),
            ..Default::default()
        };
        assert_eq!(fields(&validate_step(2, &draft, today())), vec!["features", "feature_details"]);
    }

    #[test]
    fn test_step_three_start_date() {
        let mut draft = complete_draft();
        draft.start_date = Some(today());
        assert!(validate_step(3, &draft, today()).is_empty());

        draft.start_date = today().pred_opt();
        assert_eq!(fields(&validate_step(3, &draft, today())), vec!["start_date"]);

        let draft = EstimationDraft::default();
        assert_eq!(fields(&validate_step(3, &draft, today())), vec!["budget", "timeline"]);
    }

    #[test]
    fn test_step_four() {
        let draft = EstimationDraft {
            email: "not-an-email".into(),
            phone: Some("call me".into()),
            ..Default::default()
        };
        assert_eq!(
            fields(&validate_step(4, &draft, today())),
            vec!["name", "email", "phone", "consent"]
        );
        assert!(validate_step(4, &complete_draft(), today()).is_empty());
    }

    #[test]
    fn test_unknown_step_and_validate_all() {
        assert_eq!(fields(&validate_step(0, &complete_draft(), today())), vec!["step"]);
        assert_eq!(fields(&validate_step(5, &complete_draft(), today())), vec!["step"]);
        assert!(validate_all(&complete_draft(), today()).is_empty());
        assert_eq!(validate_all(&EstimationDraft::default(), today()).len(), 6);
    }

    #[test]
    fn test_contact_validation() {
        let message = ContactMessage {
            name: "Léa".into(),
            email: "lea@example.com".into(),
            message: "Bonjour, un devis svp".into(),
            ..Default::default()
        };
        assert!(validate_contact(&message).is_empty());

        let message = ContactMessage { message: "Salut".into(), ..message };
        assert_eq!(fields(&validate_contact(&message)), vec!["message"]);
        assert_eq!(
            fields(&validate_contact(&ContactMessage::default())),
            vec!["name", "email", "message"]
        );
    }

    #[tokio::test]
    async fn test_submit_estimation_sends_mail() {
        let (service, mailer) = service(CaptchaOutcome::Passed);
        service.submit_estimation(complete_draft(), Some("token"), None).await.unwrap();

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "agency@example.com");
        assert_eq!(sent[0].reply_to.as_deref(), Some("lea@example.com"));
        assert!(sent[0].subject.contains("Léa Martin"));
        assert!(sent[0].body.contains("Online shop"));
        assert!(sent[0].body.contains("Online payment, Product catalog"));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_and_captcha() {
        let (service, mailer) = service(CaptchaOutcome::Rejected);
        match service.submit_estimation(EstimationDraft::default(), None, None).await {
            Err(FormsServiceError::Invalid(errors)) => assert!(!errors.is_empty()),
            other => panic!("unexpected result: {:?}", other),
        }
        match service.submit_estimation(complete_draft(), Some("bad"), None).await {
            Err(FormsServiceError::Invalid(errors)) => assert_eq!(fields(&errors), vec!["captcha_token"]),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_mail_failure_surfaces() {
        let (service, mailer) = service(CaptchaOutcome::Passed);
        mailer.set_failing(true);
        let message = ContactMessage {
            name: "Léa".into(),
            email: "lea@example.com".into(),
            message: "Bonjour, un devis svp".into(),
            ..Default::default()
        };
        assert!(matches!(
            service.submit_contact(message, None).await,
            Err(FormsServiceError::MailError(_))
        ));
    }
}
