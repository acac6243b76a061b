//! Notification templates.
//!
//! Rendering is a collaborator behind [`TemplateEngine`] so tenants can
//! eventually bring their own copy; [`StageTemplates`] is the built-in
//! default with one subject/body per stage. A `None` from the engine
//! means "nothing to send" and callers must not deliver anything.

use chrono::NaiveDate;

use dunlin_core::stage::Stage;

/// Everything a template may interpolate.
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub case_number: String,
    pub debtor_name: Option<String>,
    pub debtor_address: Option<String>,
    pub debtor_tax_id: Option<String>,
    /// Outstanding balance as a major-unit decimal string.
    pub amount_due: String,
    pub currency: String,
    pub due_date: NaiveDate,
    pub creditor_name: Option<String>,
    pub creditor_phone: Option<String>,
    pub creditor_email: Option<String>,
    pub creditor_bank_account: Option<String>,
    /// Later scheduled stages and the dates they would fire.
    pub upcoming_stages: Vec<(Stage, NaiveDate)>,
}

/// A subject/body pair ready for delivery.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Renders one stage's email; `None` means the stage has no template.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, stage: Stage, data: &TemplateData) -> Option<RenderedEmail>;
}

/// Built-in default templates.
pub struct StageTemplates;

impl StageTemplates {
    fn subject(stage: Stage, data: &TemplateData) -> String {
        let case = &data.case_number;
        match stage {
            Stage::PaymentReminder => format!("Payment reminder: invoice {case}"),
            Stage::OverdueNotice => format!("Overdue notice: invoice {case}"),
            Stage::DemandForPayment => format!("Demand for payment: invoice {case}"),
            Stage::CollectionWarning => format!("Final warning before collection: invoice {case}"),
            Stage::CollectionHandover => format!("Collection handover: invoice {case}"),
        }
    }

    fn opening(stage: Stage, data: &TemplateData) -> String {
        let case = &data.case_number;
        let due = data.due_date;
        match stage {
            Stage::PaymentReminder => format!(
                "This is a courtesy reminder that invoice <b>{case}</b> is due on {due}."
            ),
            Stage::OverdueNotice => format!(
                "Invoice <b>{case}</b>, due on {due}, has not been paid. \
                 Please settle the outstanding balance."
            ),
            Stage::DemandForPayment => format!(
                "Despite earlier reminders, invoice <b>{case}</b> (due {due}) remains \
                 unpaid. We hereby demand immediate payment of the outstanding balance."
            ),
            Stage::CollectionWarning => format!(
                "Invoice <b>{case}</b> (due {due}) is still unpaid. Unless the balance \
                 is settled promptly, the claim will be referred to external collection \
                 and listed on a debt exchange."
            ),
            Stage::CollectionHandover => format!(
                "Invoice <b>{case}</b> (due {due}) remains unpaid. The claim is being \
                 handed over to external collection. Further costs of recovery will be \
                 charged to you."
            ),
        }
    }

    fn body(stage: Stage, data: &TemplateData) -> String {
        let mut paragraphs = Vec::new();

        let greeting = match &data.debtor_name {
            Some(name) => format!("<p>Dear {name},</p>"),
            None => "<p>Dear Sir or Madam,</p>".to_string(),
        };
        paragraphs.push(greeting);
        paragraphs.push(format!("<p>{}</p>", Self::opening(stage, data)));
        paragraphs.push(format!(
            "<p>Amount due: <b>{} {}</b></p>",
            data.amount_due, data.currency
        ));

        if let Some(account) = &data.creditor_bank_account {
            paragraphs.push(format!("<p>Payment account: {account}</p>"));
        }

        if !stage.is_final() {
            if let Some((next_stage, date)) = data.upcoming_stages.first() {
                paragraphs.push(format!(
                    "<p>Without payment, the next step ({}) is scheduled for {date}.</p>",
                    next_stage.key().replace('_', " ")
                ));
            }
        }

        let mut signature = Vec::new();
        if let Some(name) = &data.creditor_name {
            signature.push(name.clone());
        }
        if let Some(phone) = &data.creditor_phone {
            signature.push(format!("tel. {phone}"));
        }
        if let Some(email) = &data.creditor_email {
            signature.push(email.clone());
        }
        if signature.is_empty() {
            paragraphs.push("<p>Kind regards</p>".to_string());
        } else {
            paragraphs.push(format!("<p>Kind regards,<br>{}</p>", signature.join("<br>")));
        }

        paragraphs.join("\n")
    }
}

impl TemplateEngine for StageTemplates {
    fn render(&self, stage: Stage, data: &TemplateData) -> Option<RenderedEmail> {
        Some(RenderedEmail {
            subject: Self::subject(stage, data),
            body: Self::body(stage, data),
        })
    }
}
