//! Integration tests for the full ledger pipeline.
//!
//! Service → CommandDispatcher → EventStore → EventBus → CurrencySummaryProjection
//!
//! Verifies:
//! - Fees, commissions, refunds and payouts compose end to end
//! - Rejected operations write nothing
//! - Concurrent writers on one bucket never pay out more than was earned

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Value as JsonValue;

    use feeledger_commissions::CommissionStatus;
    use feeledger_core::{Currency, LedgerError, Money, OrganizerId, PayeeId, Percentage, SaleId};
    use feeledger_events::{
        EventBus, EventEnvelope, FeePreviewRequest, InMemoryEventBus, PayoutFailed, PayoutRequest,
        RefundIssued, SaleRecorded, SettlementReported, Subscription,
    };
    use feeledger_fees::{CountryFeeConfig, PayeeFeeOverride, PayeeProfile, ProviderFee};

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::{EventStore, InMemoryEventStore};
    use crate::ledger::LedgerService;
    use crate::projections::CurrencySummaryProjection;
    use crate::settings::{CachedFeeSettings, InMemoryFeeSettings};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Service = LedgerService<Arc<InMemoryEventStore>, Bus, CachedFeeSettings<InMemoryFeeSettings>>;

    fn pct(points: Decimal) -> Percentage {
        Percentage::new(points).unwrap()
    }

    fn ngn() -> Currency {
        Currency::new("NGN").unwrap()
    }

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn nigeria() -> CountryFeeConfig {
        CountryFeeConfig {
            country_code: "NG".to_string(),
            currency: ngn(),
            service_fee_percentage: pct(dec!(5)),
            service_fee_fixed_per_ticket: dec!(0),
            service_fee_cap: None,
            processing_fee_fixed_per_order: dec!(0),
            donation_fee_percentage: pct(dec!(3)),
            transfer_fee_percentage: pct(dec!(2.5)),
            providers: BTreeMap::from([
                (
                    "paystack".to_string(),
                    ProviderFee {
                        percentage: pct(dec!(1.5)),
                        fixed: dec!(100),
                    },
                ),
                (
                    "bank".to_string(),
                    ProviderFee {
                        percentage: Percentage::ZERO,
                        fixed: dec!(0),
                    },
                ),
            ]),
        }
    }

    fn united_states() -> CountryFeeConfig {
        CountryFeeConfig {
            country_code: "US".to_string(),
            currency: usd(),
            service_fee_percentage: pct(dec!(3.7)),
            service_fee_fixed_per_ticket: dec!(1.79),
            service_fee_cap: None,
            processing_fee_fixed_per_order: dec!(0),
            donation_fee_percentage: Percentage::ZERO,
            transfer_fee_percentage: Percentage::ZERO,
            providers: BTreeMap::from([(
                "stripe".to_string(),
                ProviderFee {
                    percentage: pct(dec!(2.9)),
                    fixed: dec!(0.30),
                },
            )]),
        }
    }

    struct Harness {
        service: Arc<Service>,
        store: Arc<InMemoryEventStore>,
        projection: CurrencySummaryProjection,
        sub: Subscription<EventEnvelope<JsonValue>>,
    }

    impl Harness {
        fn new(max_conflict_retries: u32) -> Self {
            let store = Arc::new(InMemoryEventStore::new());
            let bus: Bus = Arc::new(InMemoryEventBus::new());
            let sub = bus.subscribe();
            let settings = CachedFeeSettings::new(InMemoryFeeSettings::new(), Duration::from_secs(60));
            let service = LedgerService::new(
                CommandDispatcher::new(store.clone(), bus),
                settings,
                max_conflict_retries,
            );
            service.save_country(nigeria()).unwrap();
            service.save_country(united_states()).unwrap();

            Self {
                service: Arc::new(service),
                store,
                projection: CurrencySummaryProjection::new(),
                sub,
            }
        }

        fn payee(&self, rate: Decimal) -> PayeeId {
            let payee_id = PayeeId::new();
            self.service
                .save_payee(PayeeProfile {
                    payee_id,
                    display_name: "Promoter".to_string(),
                    default_commission_rate: pct(rate),
                    fee_override: None,
                })
                .unwrap();
            payee_id
        }

        fn settle(&self, sale_id: SaleId) {
            self.service
                .mark_available(&SettlementReported { sale_id })
                .unwrap();
        }

        /// Drain the bus into the projection.
        fn sync(&self) {
            while let Ok(env) = self.sub.try_recv() {
                self.projection.apply_envelope(&env).unwrap();
            }
        }

        fn event_count(&self) -> usize {
            self.store.load_all().unwrap().len()
        }
    }

    fn ng_sale(payee_id: Option<PayeeId>, subtotal: Decimal) -> SaleRecorded {
        SaleRecorded {
            sale_id: SaleId::new(),
            currency: ngn(),
            subtotal,
            quantity: 2,
            country_code: "NG".to_string(),
            provider_id: "paystack".to_string(),
            organizer_id: OrganizerId::new(),
            payee_id,
            commission_rate: None,
        }
    }

    fn payout(payee_id: PayeeId, currency: Currency, amount: Decimal) -> PayoutRequest {
        PayoutRequest {
            payee_id,
            currency,
            amount,
            requested_by: "finance@example.com".to_string(),
            notes: None,
        }
    }

    #[test]
    fn nigerian_checkout_matches_preview() {
        let h = Harness::new(5);
        let sale = ng_sale(None, dec!(10000));

        let preview = h
            .service
            .fee_preview(&FeePreviewRequest {
                subtotal: sale.subtotal,
                quantity: sale.quantity,
                country_code: "ng".to_string(),
                provider_id: "paystack".to_string(),
                payee_id: None,
            })
            .unwrap();
        let recorded = h.service.record_sale(&sale).unwrap();

        assert_eq!(recorded.fees, preview);
        assert_eq!(recorded.fees.service_fee, dec!(500));
        assert_eq!(recorded.fees.processing_fee, dec!(257.5));
        assert_eq!(recorded.fees.total_fee, dec!(757.5));
        assert_eq!(recorded.fees.grand_total, dec!(10757.5));
        assert!(recorded.commission.is_none());
    }

    #[test]
    fn capped_service_fee() {
        let h = Harness::new(5);
        let mut ng = nigeria();
        ng.service_fee_fixed_per_ticket = dec!(200);
        ng.service_fee_cap = Some(dec!(1000));
        h.service.save_country(ng).unwrap();

        let fees = h
            .service
            .fee_preview(&FeePreviewRequest {
                subtotal: dec!(50000),
                quantity: 1,
                country_code: "NG".to_string(),
                provider_id: "bank".to_string(),
                payee_id: None,
            })
            .unwrap();

        // 5% of 50000 + 200 = 2700, capped at 1000.
        assert_eq!(fees.service_fee, dec!(1000));
        assert_eq!(fees.grand_total, dec!(51000));
    }

    #[test]
    fn misconfigured_cap_is_rejected_at_save() {
        let h = Harness::new(5);
        let mut ng = nigeria();
        ng.service_fee_fixed_per_ticket = dec!(500);
        ng.service_fee_cap = Some(dec!(100));

        let err = h.service.save_country(ng).unwrap_err();
        assert!(matches!(err, LedgerError::CapMisconfigured { .. }));
        assert_eq!(h.service.country("NG").unwrap(), nigeria());
    }

    fn capped_payee(payee_id: PayeeId, cap: Decimal) -> PayeeProfile {
        PayeeProfile {
            payee_id,
            display_name: "Capped".to_string(),
            default_commission_rate: pct(dec!(10)),
            fee_override: Some(PayeeFeeOverride {
                enabled: true,
                percentage: None,
                fixed: None,
                cap: Some(cap),
            }),
        }
    }

    /// An override cap of 50 under a country fixed fee of 100 would charge
    /// less than the per-ticket minimum, so it never reaches the store.
    #[test]
    fn override_cap_below_country_fixed_fee_is_rejected_at_save() {
        let h = Harness::new(5);
        let mut ng = nigeria();
        ng.service_fee_fixed_per_ticket = dec!(100);
        h.service.save_country(ng).unwrap();

        let payee_id = PayeeId::new();
        let err = h.service.save_payee(capped_payee(payee_id, dec!(50))).unwrap_err();
        assert_eq!(
            err,
            LedgerError::CapMisconfigured {
                cap: dec!(50),
                minimum: dec!(100)
            }
        );
        assert_eq!(h.service.payee(payee_id).unwrap_err(), LedgerError::UnknownPayee(payee_id));

        h.service.save_payee(capped_payee(payee_id, dec!(150))).unwrap();
        let fees = h
            .service
            .fee_preview(&FeePreviewRequest {
                subtotal: dec!(1000),
                quantity: 1,
                country_code: "NG".to_string(),
                provider_id: "bank".to_string(),
                payee_id: Some(payee_id),
            })
            .unwrap();
        // 5% of 1000 + 100 = 150, exactly the cap.
        assert_eq!(fees.service_fee, dec!(150));
    }

    #[test]
    fn country_fixed_fee_above_a_registered_override_cap_is_rejected() {
        let h = Harness::new(5);
        let payee_id = PayeeId::new();
        h.service.save_payee(capped_payee(payee_id, dec!(50))).unwrap();

        let mut ng = nigeria();
        ng.service_fee_fixed_per_ticket = dec!(100);
        let err = h.service.save_country(ng).unwrap_err();
        assert!(matches!(err, LedgerError::CapMisconfigured { .. }));
        assert_eq!(h.service.country("NG").unwrap(), nigeria());

        // A disabled override no longer constrains the country table.
        let mut profile = capped_payee(payee_id, dec!(50));
        if let Some(o) = profile.fee_override.as_mut() {
            o.enabled = false;
        }
        h.service.save_payee(profile).unwrap();
        let mut ng = nigeria();
        ng.service_fee_fixed_per_ticket = dec!(100);
        h.service.save_country(ng).unwrap();
    }

    #[test]
    fn payee_override_changes_only_subsequent_sales() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let first = h.service.record_sale(&ng_sale(Some(payee_id), dec!(10000))).unwrap();

        h.service
            .save_payee(PayeeProfile {
                payee_id,
                display_name: "Promoter".to_string(),
                default_commission_rate: pct(dec!(10)),
                fee_override: Some(PayeeFeeOverride {
                    enabled: true,
                    percentage: Some(pct(dec!(2))),
                    fixed: None,
                    cap: None,
                }),
            })
            .unwrap();
        let second = h.service.record_sale(&ng_sale(Some(payee_id), dec!(10000))).unwrap();

        assert_eq!(second.fees.service_fee, dec!(200));
        assert_eq!(h.service.sale_fees(first.sale_id).unwrap().service_fee, dec!(500));
    }

    /// Promoter example: 10% of 5000 is 500 pending; a full refund reverses it.
    #[test]
    fn promoter_commission_is_reversed_by_a_full_refund() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(5000));

        let recorded = h.service.record_sale(&sale).unwrap();
        let entry = recorded.commission.unwrap();
        assert_eq!(entry.commission_amount, dec!(500));
        assert_eq!(entry.status, CommissionStatus::Pending);
        assert_eq!(h.service.balance(payee_id, &ngn()).unwrap().earned, dec!(500));

        let outcome = h
            .service
            .reverse(&RefundIssued {
                sale_id: sale.sale_id,
                refunded_fraction: dec!(1),
            })
            .unwrap();

        assert_eq!(outcome.commission.unwrap().status, CommissionStatus::Reversed);
        assert_eq!(outcome.fees.total_fee, dec!(0));
        let snapshot = h.service.snapshot(payee_id, &ngn()).unwrap();
        assert_eq!(snapshot.earned, dec!(0));
        assert_eq!(snapshot.unpaid, dec!(0));
    }

    #[test]
    fn double_reverse_equals_single_reverse() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(5000));
        h.service.record_sale(&sale).unwrap();
        let refund = RefundIssued {
            sale_id: sale.sale_id,
            refunded_fraction: dec!(0.5),
        };

        let first = h.service.reverse(&refund).unwrap();
        let events = h.event_count();
        let second = h.service.reverse(&refund).unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.fees, second.fees);
        assert_eq!(h.event_count(), events);
        assert_eq!(h.service.balance(payee_id, &ngn()).unwrap().earned, dec!(250));
    }

    #[test]
    fn duplicate_sale_writes_nothing() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(5000));
        h.service.record_sale(&sale).unwrap();
        let events = h.event_count();

        let err = h.service.record_sale(&sale).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateSale(sale.sale_id));
        assert_eq!(h.event_count(), events);
        assert_eq!(h.service.balance(payee_id, &ngn()).unwrap().earned, dec!(500));
    }

    #[test]
    fn unknown_references_are_rejected() {
        let h = Harness::new(5);
        let stranger = PayeeId::new();

        let err = h.service.record_sale(&ng_sale(Some(stranger), dec!(100))).unwrap_err();
        assert_eq!(err, LedgerError::UnknownPayee(stranger));

        let mut sale = ng_sale(None, dec!(100));
        sale.country_code = "ZZ".to_string();
        assert_eq!(
            h.service.record_sale(&sale).unwrap_err(),
            LedgerError::UnknownCountry("ZZ".to_string())
        );

        let mut sale = ng_sale(None, dec!(100));
        sale.currency = usd();
        assert!(matches!(
            h.service.record_sale(&sale),
            Err(LedgerError::InvalidCurrency(_))
        ));

        let unknown = SaleId::new();
        assert_eq!(
            h.service
                .reverse(&RefundIssued {
                    sale_id: unknown,
                    refunded_fraction: dec!(1)
                })
                .unwrap_err(),
            LedgerError::UnknownSale(unknown)
        );
        assert_eq!(h.event_count(), 0);
    }

    #[test]
    fn overpay_is_rejected_and_ledger_unchanged() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(10000));
        h.service.record_sale(&sale).unwrap();
        h.settle(sale.sale_id);
        let before = h.service.balance(payee_id, &ngn()).unwrap();

        let err = h.service.request_payout(&payout(payee_id, ngn(), dec!(1000.01))).unwrap_err();

        assert_eq!(
            err,
            LedgerError::OverpayPayout {
                unpaid: Money::new(dec!(1000), ngn())
            }
        );
        assert_eq!(h.service.balance(payee_id, &ngn()).unwrap(), before);
    }

    /// 10% of an unsettled 5000 sale is 500 unpaid but nothing payable, so the
    /// sale can still be refunded in full.
    #[test]
    fn pending_commission_cannot_be_paid_out() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(5000));
        h.service.record_sale(&sale).unwrap();
        let events = h.event_count();

        let err = h.service.request_payout(&payout(payee_id, ngn(), dec!(500))).unwrap_err();
        assert_eq!(
            err,
            LedgerError::OverpayPayout {
                unpaid: Money::new(dec!(0), ngn())
            }
        );
        assert_eq!(h.event_count(), events);

        let reversed = h
            .service
            .reverse(&RefundIssued {
                sale_id: sale.sale_id,
                refunded_fraction: dec!(1),
            })
            .unwrap();
        assert_eq!(reversed.commission.unwrap().status, CommissionStatus::Reversed);
        assert_eq!(h.service.balance(payee_id, &ngn()).unwrap().earned, dec!(0));
    }

    #[test]
    fn refunding_a_pending_sale_after_unrelated_payouts_succeeds() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let settled = ng_sale(Some(payee_id), dec!(10000));
        let pending = ng_sale(Some(payee_id), dec!(5000));
        h.service.record_sale(&settled).unwrap();
        h.service.record_sale(&pending).unwrap();
        h.settle(settled.sale_id);

        h.service.request_payout(&payout(payee_id, ngn(), dec!(1000))).unwrap();
        h.service
            .reverse(&RefundIssued {
                sale_id: pending.sale_id,
                refunded_fraction: dec!(1),
            })
            .unwrap();

        let balance = h.service.balance(payee_id, &ngn()).unwrap();
        assert_eq!(balance.earned, dec!(1000));
        assert_eq!(balance.paid, dec!(1000));
        assert_eq!(balance.unpaid, dec!(0));
        assert_eq!(balance.reversed_count, 1);
    }

    #[test]
    fn settled_commission_is_paid_and_cannot_be_silently_reversed() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(10000));
        h.service.record_sale(&sale).unwrap();

        let entry = h
            .service
            .mark_available(&SettlementReported { sale_id: sale.sale_id })
            .unwrap();
        assert_eq!(entry.status, CommissionStatus::Available);

        let paid = h.service.request_payout(&payout(payee_id, ngn(), dec!(1000))).unwrap();
        let bucket = h.service.bucket(payee_id, &ngn()).unwrap();
        assert_eq!(bucket.entries()[0].status, CommissionStatus::Paid);
        assert_eq!(bucket.balance().unpaid, dec!(0));

        let err = h
            .service
            .reverse(&RefundIssued {
                sale_id: sale.sale_id,
                refunded_fraction: dec!(1),
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::ReversalRequiresClawback(sale.sale_id));
        // The sale's stored fees were not reduced either.
        assert_eq!(h.service.sale_fees(sale.sale_id).unwrap().service_fee, dec!(500));

        let failed = h
            .service
            .fail_payout(&PayoutFailed {
                payee_id,
                currency: ngn(),
                payout_id: paid.payout_id,
            })
            .unwrap();
        assert_eq!(failed.status, feeledger_commissions::PayoutStatus::Failed);
        assert_eq!(h.service.balance(payee_id, &ngn()).unwrap().unpaid, dec!(1000));
    }

    #[test]
    fn settlement_without_payee_is_an_invalid_transition() {
        let h = Harness::new(5);
        let sale = ng_sale(None, dec!(100));
        h.service.record_sale(&sale).unwrap();

        let err = h
            .service
            .mark_available(&SettlementReported { sale_id: sale.sale_id })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition(_)));
    }

    /// NGN 1000 and USD 50 are reported side by side, never summed.
    #[test]
    fn currencies_stay_isolated_end_to_end() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let organizer = OrganizerId::new();

        let mut ng = ng_sale(Some(payee_id), dec!(10000));
        ng.organizer_id = organizer;
        let us = SaleRecorded {
            sale_id: SaleId::new(),
            currency: usd(),
            subtotal: dec!(500),
            quantity: 1,
            country_code: "US".to_string(),
            provider_id: "stripe".to_string(),
            organizer_id: organizer,
            payee_id: Some(payee_id),
            commission_rate: None,
        };
        h.service.record_sale(&ng).unwrap();
        h.service.record_sale(&us).unwrap();
        h.settle(us.sale_id);

        let err = h.service.request_payout(&payout(payee_id, usd(), dec!(51))).unwrap_err();
        assert_eq!(
            err,
            LedgerError::OverpayPayout {
                unpaid: Money::new(dec!(50), usd())
            }
        );

        h.sync();
        let payee = h.projection.payee_summary(payee_id).unwrap();
        assert_eq!(payee.get(&ngn()).unwrap().unpaid, dec!(1000));
        assert_eq!(payee.get(&usd()).unwrap().unpaid, dec!(50));

        let org = h.projection.organizer_summary(organizer).unwrap();
        assert_eq!(org.get(&ngn()).unwrap().gross_revenue, dec!(10000));
        assert_eq!(org.get(&usd()).unwrap().gross_revenue, dec!(500));
        assert_eq!(org.per_currency.len(), 2);
    }

    #[test]
    fn projection_rebuild_matches_live_updates() {
        let h = Harness::new(5);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(8000));
        h.service.record_sale(&sale).unwrap();
        h.service
            .reverse(&RefundIssued {
                sale_id: sale.sale_id,
                refunded_fraction: dec!(0.25),
            })
            .unwrap();
        h.sync();

        let rebuilt = CurrencySummaryProjection::new();
        rebuilt.rebuild(&h.store.load_all().unwrap()).unwrap();

        assert_eq!(
            rebuilt.payee_summary(payee_id).unwrap(),
            h.projection.payee_summary(payee_id).unwrap()
        );
        let org = rebuilt.organizer_summary(sale.organizer_id).unwrap();
        assert_eq!(org.get(&ngn()).unwrap().gross_revenue, dec!(6000));
        assert_eq!(org.get(&ngn()).unwrap().commissions_unpaid, dec!(600));
    }

    #[test]
    fn concurrent_payouts_never_exceed_earned() {
        let h = Harness::new(100);
        let payee_id = h.payee(dec!(10));
        let sale = ng_sale(Some(payee_id), dec!(10000));
        h.service.record_sale(&sale).unwrap();
        h.settle(sale.sale_id);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = h.service.clone();
                thread::spawn(move || service.request_payout(&payout(payee_id, ngn(), dec!(300))))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|j| j.join().unwrap()).collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(err, LedgerError::OverpayPayout { .. } | LedgerError::Conflict(_)),
                "unexpected error {err:?}"
            );
        }

        let balance = h.service.balance(payee_id, &ngn()).unwrap();
        assert!(succeeded <= 3);
        assert_eq!(balance.paid, Decimal::from(succeeded as u64 * 300));
        assert!(balance.paid <= balance.earned);
        assert!(balance.unpaid >= Decimal::ZERO);
    }

    #[test]
    fn donation_and_transfer_fees_use_the_country_rates() {
        let h = Harness::new(5);
        assert_eq!(h.service.donation_fee("NG", dec!(2000)).unwrap().donation_fee, dec!(60));
        assert_eq!(h.service.transfer_fee("NG", dec!(5000)).unwrap().transfer_fee, dec!(125));
    }
}
