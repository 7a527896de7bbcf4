use store::{MemberStatus, MemberStore, NewPayment, Notice};

use super::{Outcome, Submission};
use crate::error::{PortalError, Result};
use crate::forms::FormKind;
use crate::mail::{admin_notification, receipt};
use crate::payment::{card, extend_expiry, validate_payment};
use crate::portal::Portal;
use crate::roles::RoleRegistry;
use crate::shortcodes::{StatusFlag, StatusFlags};

impl<S: MemberStore> Portal<S> {
    /// Capture dues for the signed-in account and renew its membership.
    pub async fn handle_payment(&self, submission: Submission<'_>) -> Outcome {
        if !submission.gate(FormKind::Payment) {
            return Outcome::Ignored;
        }
        let result = self.process_payment(&submission).await;
        Self::finish(FormKind::Payment, result, Vec::new())
    }

    async fn process_payment(&self, submission: &Submission<'_>) -> Result<Outcome> {
        let kind = FormKind::Payment;
        self.check_token(kind.key(), &kind.nonce_field(), submission)?;
        let payer = submission.scope.account().ok_or(PortalError::Forbidden)?;

        let options = self.repo().options().await?;
        let form = self.form(kind, submission.scope, &options, submission.seed, submission.now);
        let values = form.sanitize(submission.input);
        let today = submission.now.date_naive();
        let request =
            validate_payment(&form, &values, &options, today).map_err(PortalError::Validation)?;

        let charge = request.charge(&payer.email);
        let capture = self
            .gateway
            .charge(&charge, &options)
            .await
            .map_err(PortalError::Gateway)?;
        tracing::info!(
            account = payer.id,
            amount = %charge.amount,
            reference = %capture.reference,
            "dues captured"
        );

        let payment = self
            .repo()
            .record_payment(NewPayment {
                account_id: payer.id,
                amount: charge.amount,
                member_type: request.member_type.name.clone(),
                card_type: request.card.brand.to_string(),
                card_masked: card::mask(&request.card.number),
                card_exp_month: request.card.exp_month,
                card_exp_year: request.card.exp_year,
                cc_name: request.card.holder.clone(),
                reference: capture.reference,
            })
            .await?;

        let mut account = self
            .repo()
            .store()
            .account(payer.id)
            .await?
            .ok_or_else(|| PortalError::EntityMutation("Your account could not be found.".into()))?;
        account.profile.member_status = MemberStatus::Active;
        account.profile.member_expiry = Some(extend_expiry(today, account.profile.member_expiry));
        account.profile.member_date_joined.get_or_insert(today);
        RoleRegistry::new(self.repo())
            .assign(&mut account, &request.member_type.role_slug())
            .await?;
        tracing::info!(
            account = account.id,
            payment = payment.id,
            expiry = ?account.profile.member_expiry,
            "membership renewed"
        );

        let mut flags: StatusFlags = [StatusFlag::PaymentReceived].into_iter().collect();
        let mut notices = Vec::new();

        let notification = admin_notification(&options, &account, &payment);
        if notification.has_recipients() {
            if let Err(e) = self.mailer.send(&notification).await {
                tracing::warn!(payment = payment.id, error = %e, "admin payment mail failed");
                notices.push(Notice::warning(
                    "Your payment was received, but the association could not be notified by email.",
                ));
            }
        }
        let receipt = receipt(&account, &payment);
        if receipt.has_recipients() {
            match self.mailer.send(&receipt).await {
                Ok(()) => flags.insert(StatusFlag::EmailSent),
                Err(e) => {
                    tracing::warn!(payment = payment.id, error = %e, "receipt mail failed");
                    notices.push(Notice::warning(
                        "Your payment was received, but the receipt could not be emailed.",
                    ));
                }
            }
        }

        Ok(Outcome::redirect(&options.pages.after_payment, flags).with_notices(notices))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Datelike, Months, NaiveDate, Utc};
    use store::options::{AdminContact, RecipientKind};
    use store::{
        MemberAccount, MemoryStore, Money, NewAccount, NoticeLevel, PaymentStatus, PortalOptions,
    };

    use super::super::testing::*;
    use super::*;
    use crate::fields::core::ids;
    use crate::viewer::RequestScope;

    const SLUG: &str = "asamp_standardasamember";

    async fn payer(portal: &Portal<MemoryStore>, expiry: Option<NaiveDate>) -> MemberAccount {
        let profile = store::Profile {
            company_name: "Acme".into(),
            member_status: MemberStatus::Inactive,
            member_expiry: expiry,
            ..Default::default()
        };
        portal
            .repo()
            .store()
            .insert_account(NewAccount {
                login: "acme".into(),
                email: "office@acme.test".into(),
                profile,
                ..NewAccount::default()
            })
            .await
            .unwrap()
    }

    fn card_input(portal: &Portal<MemoryStore>) -> crate::forms::FormInput {
        let year = (Utc::now().year() + 1).to_string();
        post(
            portal,
            FormKind::Payment,
            &[
                (ids::PAYMENT_MEMBER_TYPE, SLUG),
                (ids::PAYMENT_CC_NAME, "Jane Smith"),
                (ids::PAYMENT_CARD_NUMBER, "4111 1111 1111 1111"),
                (ids::PAYMENT_CARD_EXP_MONTH, "12"),
                (ids::PAYMENT_CARD_EXP_YEAR, year.as_str()),
                (ids::PAYMENT_CARD_CVV, "123"),
            ],
        )
    }

    async fn with_admin_contacts(portal: &Portal<MemoryStore>) {
        let options = PortalOptions {
            admin_contacts: vec![
                AdminContact {
                    name: "Treasurer".into(),
                    email: "treasurer@asa.test".into(),
                    kind: RecipientKind::To,
                },
                AdminContact {
                    name: String::new(),
                    email: "board@asa.test".into(),
                    kind: RecipientKind::Bcc,
                },
            ],
            ..PortalOptions::default()
        };
        portal.repo().store().save_options(&options).await.unwrap();
    }

    #[tokio::test]
    async fn test_payment_renews_membership_and_mails() {
        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(FakeMailer::default());
        let portal = portal_with(gateway.clone(), mailer.clone());
        with_admin_contacts(&portal).await;
        let account = payer(&portal, None).await;

        let input = card_input(&portal);
        let scope = RequestScope::signed_in(account.clone());
        let outcome = portal.handle_payment(submission(&scope, &input)).await;
        match &outcome {
            Outcome::Redirect { to, notices, .. } => {
                assert_eq!(to, "/member-profile?payment_received=true&email_sent=true");
                assert!(notices.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        let charges = gateway.charges.lock().unwrap().clone();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].amount, Money::from_dollars(900));
        assert_eq!(charges[0].receipt_email, "office@acme.test");

        let today = Utc::now().date_naive();
        let renewed = portal.repo().store().account(account.id).await.unwrap().unwrap();
        assert_eq!(renewed.profile.member_status, MemberStatus::Active);
        assert_eq!(renewed.member_role(), Some(SLUG));
        assert_eq!(renewed.profile.member_date_joined, Some(today));
        assert_eq!(
            renewed.profile.member_expiry,
            today.checked_add_months(Months::new(12))
        );

        let payments = portal.repo().store().payments_for(account.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        let payment = &payments[0];
        assert_eq!(payment.title, format!("Payment #{}", payment.id));
        assert_eq!(payment.status, PaymentStatus::Private);
        assert_eq!(payment.card_masked, "************1111");
        assert_eq!(payment.card_type, "visa");
        assert_eq!(payment.reference, "ch_1");

        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, vec!["Treasurer <treasurer@asa.test>".to_string()]);
        assert_eq!(sent[0].bcc, vec!["board@asa.test".to_string()]);
        assert_eq!(sent[1].to, vec!["office@acme.test".to_string()]);
        assert_eq!(sent[1].subject, format!("Receipt for Payment #{}", payment.id));
    }

    #[tokio::test]
    async fn test_expiry_extends_from_future_date() {
        let portal = portal();
        let later = Utc::now().date_naive() + chrono::Duration::days(100);
        let account = payer(&portal, Some(later)).await;
        let input = card_input(&portal);
        let scope = RequestScope::signed_in(account.clone());
        assert!(portal.handle_payment(submission(&scope, &input)).await.is_redirect());
        let renewed = portal.repo().store().account(account.id).await.unwrap().unwrap();
        assert_eq!(
            renewed.profile.member_expiry,
            later.checked_add_months(Months::new(12))
        );
    }

    #[tokio::test]
    async fn test_declined_card_records_nothing() {
        let gateway = Arc::new(FakeGateway {
            decline: Some("Your card was declined.".into()),
            ..FakeGateway::default()
        });
        let portal = portal_with(gateway, Arc::default());
        let account = payer(&portal, None).await;
        let input = card_input(&portal);
        let scope = RequestScope::signed_in(account.clone());
        let outcome = portal.handle_payment(submission(&scope, &input)).await;
        assert_eq!(rerender_message(&outcome), "Your card was declined.");
        assert!(portal.repo().store().payments_for(account.id).await.unwrap().is_empty());
        let unchanged = portal.repo().store().account(account.id).await.unwrap().unwrap();
        assert_eq!(unchanged.profile.member_status, MemberStatus::Inactive);
    }

    #[tokio::test]
    async fn test_mail_failure_is_a_warning() {
        let mailer = Arc::new(FakeMailer {
            fail: true,
            ..FakeMailer::default()
        });
        let portal = portal_with(Arc::default(), mailer);
        with_admin_contacts(&portal).await;
        let account = payer(&portal, None).await;
        let input = card_input(&portal);
        let scope = RequestScope::signed_in(account.clone());
        match portal.handle_payment(submission(&scope, &input)).await {
            Outcome::Redirect { flags, notices, .. } => {
                assert!(flags.contains(StatusFlag::PaymentReceived));
                assert!(!flags.contains(StatusFlag::EmailSent));
                assert_eq!(notices.len(), 2);
                assert!(notices.iter().all(|n| n.level == NoticeLevel::Warning));
            }
            other => panic!("unexpected {:?}", other),
        }
        let renewed = portal.repo().store().account(account.id).await.unwrap().unwrap();
        assert_eq!(renewed.profile.member_status, MemberStatus::Active);
    }

    #[tokio::test]
    async fn test_payment_requires_account_and_valid_card() {
        let portal = portal();
        let input = card_input(&portal);
        let anonymous = RequestScope::anonymous();
        let outcome = portal.handle_payment(submission(&anonymous, &input)).await;
        assert_eq!(rerender_message(&outcome), "You are not allowed to do that.");

        let account = payer(&portal, None).await;
        let scope = RequestScope::signed_in(account);
        let bad = post(
            &portal,
            FormKind::Payment,
            &[
                (ids::PAYMENT_MEMBER_TYPE, SLUG),
                (ids::PAYMENT_CC_NAME, "Jane Smith"),
                (ids::PAYMENT_CARD_NUMBER, "4111 1111 1111 1112"),
                (ids::PAYMENT_CARD_EXP_MONTH, "12"),
                (ids::PAYMENT_CARD_CVV, "123"),
            ],
        );
        let outcome = portal.handle_payment(submission(&scope, &bad)).await;
        let errors = rerender_errors(&outcome);
        assert!(errors.contains_key("card_number"));
        assert!(errors.contains_key("card_exp_year"));
    }
}
