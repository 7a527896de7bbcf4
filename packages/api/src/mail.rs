//! Outbound email: the [`Mailer`] seam and the two messages a payment produces.

use async_trait::async_trait;
use serde::Serialize;
use store::options::{PortalOptions, RecipientKind};
use store::{DuesPayment, MemberAccount};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), String>;
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogMailer {
    pub from: String,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), String> {
        tracing::info!(
            from = %self.from,
            to = ?email.to,
            cc = ?email.cc,
            bcc = ?email.bcc,
            subject = %email.subject,
            "mail"
        );
        tracing::debug!(body = %email.body);
        Ok(())
    }
}

fn display(name: &str, email: &str) -> String {
    if name.trim().is_empty() {
        email.to_string()
    } else {
        format!("{} <{}>", name.trim(), email)
    }
}

fn payment_lines(account: &MemberAccount, payment: &DuesPayment) -> String {
    format!(
        "Company: {}\nMember Type: {}\nAmount: {}\nCard: {} {}\nName on Card: {}\nReference: {}\n",
        account.profile.company_name,
        payment.member_type,
        payment.amount,
        payment.card_type,
        payment.card_masked,
        payment.cc_name,
        payment.reference,
    )
}

/// Payment notice for the configured admin contacts, split into To/CC/BCC.
pub fn admin_notification(
    options: &PortalOptions,
    account: &MemberAccount,
    payment: &DuesPayment,
) -> Email {
    let mut email = Email {
        subject: format!("Dues payment received: {}", account.profile.company_name),
        body: format!("{} has paid their dues.\n\n{}", account.login, payment_lines(account, payment)),
        ..Email::default()
    };
    for contact in options.admin_contacts.iter().filter(|c| !c.email.trim().is_empty()) {
        let address = display(&contact.name, contact.email.trim());
        match contact.kind {
            RecipientKind::To => email.to.push(address),
            RecipientKind::Cc => email.cc.push(address),
            RecipientKind::Bcc => email.bcc.push(address),
        }
    }
    email
}

/// Receipt for the payer's email on file.
pub fn receipt(account: &MemberAccount, payment: &DuesPayment) -> Email {
    Email {
        to: vec![account.email.clone()].into_iter().filter(|e| !e.is_empty()).collect(),
        subject: format!("Receipt for {}", payment.title),
        body: format!(
            "Thank you for your payment.\n\n{}",
            payment_lines(account, payment)
        ),
        ..Email::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store::options::AdminContact;
    use store::{Money, PaymentStatus, Profile};

    fn account() -> MemberAccount {
        MemberAccount {
            id: 1,
            login: "acme".into(),
            email: "office@acme.test".into(),
            password_hash: String::new(),
            display_name: "Acme".into(),
            roles: Default::default(),
            hide_admin_bar: true,
            profile: Profile {
                company_name: "Acme".into(),
                ..Profile::default()
            },
            registered_at: Utc::now(),
        }
    }

    fn payment() -> DuesPayment {
        DuesPayment {
            id: 7,
            account_id: 1,
            title: "Payment #7".into(),
            slug: "payment-7".into(),
            status: PaymentStatus::Private,
            amount: Money::from_dollars(900),
            member_type: "Standard ASA Member".into(),
            card_type: "visa".into(),
            card_masked: "************1111".into(),
            card_exp_month: 12,
            card_exp_year: 2030,
            cc_name: "Jane Smith".into(),
            reference: "ch_1".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_recipients_split_by_kind() {
        let contact = |name: &str, email: &str, kind| AdminContact {
            name: name.into(),
            email: email.into(),
            kind,
        };
        let options = PortalOptions {
            admin_contacts: vec![
                contact("Office", "office@asa.test", RecipientKind::To),
                contact("", "board@asa.test", RecipientKind::Cc),
                contact("Audit", "audit@asa.test", RecipientKind::Bcc),
                contact("Blank", " ", RecipientKind::To),
            ],
            ..PortalOptions::default()
        };
        let email = admin_notification(&options, &account(), &payment());
        assert_eq!(email.to, vec!["Office <office@asa.test>"]);
        assert_eq!(email.cc, vec!["board@asa.test"]);
        assert_eq!(email.bcc, vec!["Audit <audit@asa.test>"]);
        assert!(email.body.contains("************1111"));
        assert!(email.body.contains("$900"));
    }

    #[test]
    fn test_receipt_goes_to_account_email() {
        let email = receipt(&account(), &payment());
        assert_eq!(email.to, vec!["office@acme.test"]);
        assert_eq!(email.subject, "Receipt for Payment #7");
        assert!(!admin_notification(&PortalOptions::default(), &account(), &payment()).has_recipients());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts() {
        let mailer = LogMailer::default();
        assert!(mailer.send(&receipt(&account(), &payment())).await.is_ok());
    }
}
