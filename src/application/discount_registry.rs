//! Deduplicating discount-object registry.
//!
//! Finds-or-creates payment-provider discount objects and the internal
//! records mirroring them. Lookup-first: the external call and the insert
//! only happen on a miss. Two callers racing between lookup and insert are
//! resolved by the unique constraint on the lookup key - the loser's
//! insert comes back `Duplicate` with the winner's row and the loser
//! returns that instead of erroring. A duplicate provider-side object from
//! the losing call is tolerated; nothing references it.

use std::sync::Arc;

use tracing::info;

use crate::domain::coupon::{
    Coupon, CouponKey, DiscountClass, MerchantCoupon, MerchantCouponKey,
};
use crate::domain::foundation::{CouponId, DomainError, MerchantCouponId, ProductId};
use crate::ports::{
    CouponRepository, CreateDiscountRequest, MerchantCouponRepository, PaymentProvider,
};

/// Registry over merchant coupons and internal coupon records.
pub struct DiscountRegistry {
    merchant_coupons: Arc<dyn MerchantCouponRepository>,
    coupons: Arc<dyn CouponRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl DiscountRegistry {
    pub fn new(
        merchant_coupons: Arc<dyn MerchantCouponRepository>,
        coupons: Arc<dyn CouponRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            merchant_coupons,
            coupons,
            payment_provider,
        }
    }

    /// Finds or creates the merchant coupon for `(amount, class)`.
    ///
    /// On a miss, creates the discount object at the payment provider
    /// first, then inserts the mirror record. The external call happens
    /// before the local write so a failed call leaves no local state.
    pub async fn find_or_create_merchant_coupon(
        &self,
        amount_cents: i64,
        discount_class: DiscountClass,
    ) -> Result<MerchantCoupon, DomainError> {
        let key = MerchantCouponKey {
            amount_discount_cents: amount_cents,
            discount_class,
        };
        if let Some(existing) = self.merchant_coupons.find_by_key(&key).await? {
            return Ok(existing);
        }

        let discount = self
            .payment_provider
            .create_discount(CreateDiscountRequest {
                amount_off_cents: amount_cents,
                discount_class,
                name: format!("{} {}c", discount_class, amount_cents),
            })
            .await?;

        let candidate = MerchantCoupon::new(
            MerchantCouponId::new(),
            discount.id,
            amount_cents,
            discount_class,
        );
        let outcome = self.merchant_coupons.insert(&candidate).await?;
        if outcome.was_created() {
            info!(
                amount_cents,
                discount_class = %discount_class,
                "Created merchant coupon"
            );
        }
        Ok(outcome.into_inner())
    }

    /// Finds or creates the product-restricted credit coupon for the
    /// given merchant coupon and exact amount.
    pub async fn find_or_create_credit_coupon(
        &self,
        merchant_coupon_id: MerchantCouponId,
        product_id: ProductId,
        amount_cents: i64,
    ) -> Result<Coupon, DomainError> {
        let key = CouponKey {
            merchant_coupon_id,
            restricted_to_product_id: Some(product_id),
            amount_discount_cents: amount_cents,
        };
        if let Some(existing) = self.coupons.find_by_key(&key).await? {
            return Ok(existing);
        }

        let candidate = Coupon::credit(
            CouponId::new(),
            merchant_coupon_id,
            amount_cents,
            product_id,
        );
        let outcome = self.coupons.insert(&candidate).await?;
        if outcome.was_created() {
            info!(
                product_id = %product_id,
                amount_cents,
                "Created credit coupon"
            );
        }
        Ok(outcome.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{CheckoutSession, InsertOutcome, PaymentError, ProviderDiscount};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct MockMerchantCouponRepository {
        rows: Mutex<Vec<MerchantCoupon>>,
        /// Simulates another writer winning between lookup and insert.
        steal_insert: Mutex<Option<MerchantCoupon>>,
    }

    impl MockMerchantCouponRepository {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                steal_insert: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl MerchantCouponRepository for MockMerchantCouponRepository {
        async fn find_by_key(
            &self,
            key: &MerchantCouponKey,
        ) -> Result<Option<MerchantCoupon>, DomainError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|m| &m.key() == key)
                .cloned())
        }

        async fn insert(
            &self,
            merchant_coupon: &MerchantCoupon,
        ) -> Result<InsertOutcome<MerchantCoupon>, DomainError> {
            if let Some(winner) = self.steal_insert.lock().unwrap().take() {
                self.rows.lock().unwrap().push(winner.clone());
                return Ok(InsertOutcome::Duplicate(winner));
            }
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter().find(|m| m.key() == merchant_coupon.key()) {
                return Ok(InsertOutcome::Duplicate(existing.clone()));
            }
            rows.push(merchant_coupon.clone());
            Ok(InsertOutcome::Created(merchant_coupon.clone()))
        }
    }

    struct MockCouponRepository {
        rows: Mutex<Vec<Coupon>>,
    }

    impl MockCouponRepository {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CouponRepository for MockCouponRepository {
        async fn find_by_key(&self, key: &CouponKey) -> Result<Option<Coupon>, DomainError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.key().as_ref() == Some(key))
                .cloned())
        }

        async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
            Ok(self.rows.lock().unwrap().iter().find(|c| &c.id == id).cloned())
        }

        async fn find_by_restriction_and_amount(
            &self,
            product_id: &ProductId,
            amount_cents: i64,
        ) -> Result<Option<Coupon>, DomainError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|c| {
                    c.restricted_to_product_id.as_ref() == Some(product_id)
                        && c.discount.amount_cents() == Some(amount_cents)
                })
                .cloned())
        }

        async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome<Coupon>, DomainError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows
                .iter()
                .find(|c| c.key().is_some() && c.key() == coupon.key())
            {
                return Ok(InsertOutcome::Duplicate(existing.clone()));
            }
            rows.push(coupon.clone());
            Ok(InsertOutcome::Created(coupon.clone()))
        }
    }

    struct MockPaymentProvider {
        discount_calls: AtomicUsize,
    }

    impl MockPaymentProvider {
        fn new() -> Self {
            Self {
                discount_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPaymentProvider {
        async fn create_discount(
            &self,
            request: CreateDiscountRequest,
        ) -> Result<ProviderDiscount, PaymentError> {
            let n = self.discount_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderDiscount {
                id: format!("disc_{}", n),
                amount_off_cents: request.amount_off_cents,
            })
        }

        async fn get_checkout_session(
            &self,
            _session_id: &str,
        ) -> Result<Option<CheckoutSession>, PaymentError> {
            Ok(None)
        }
    }

    fn registry() -> (
        DiscountRegistry,
        Arc<MockMerchantCouponRepository>,
        Arc<MockCouponRepository>,
        Arc<MockPaymentProvider>,
    ) {
        let merchants = Arc::new(MockMerchantCouponRepository::new());
        let coupons = Arc::new(MockCouponRepository::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let registry = DiscountRegistry::new(
            merchants.clone(),
            coupons.clone(),
            provider.clone(),
        );
        (registry, merchants, coupons, provider)
    }

    #[tokio::test]
    async fn creates_merchant_coupon_on_first_call_only() {
        let (registry, merchants, _, provider) = registry();

        let first = registry
            .find_or_create_merchant_coupon(500, DiscountClass::Credit)
            .await
            .unwrap();
        let second = registry
            .find_or_create_merchant_coupon(500, DiscountClass::Credit)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(merchants.rows.lock().unwrap().len(), 1);
        assert_eq!(provider.discount_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_create_distinct_merchant_coupons() {
        let (registry, merchants, _, _) = registry();

        registry
            .find_or_create_merchant_coupon(500, DiscountClass::Credit)
            .await
            .unwrap();
        registry
            .find_or_create_merchant_coupon(500, DiscountClass::Promotion)
            .await
            .unwrap();
        registry
            .find_or_create_merchant_coupon(900, DiscountClass::Credit)
            .await
            .unwrap();

        assert_eq!(merchants.rows.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn losing_insert_returns_the_winning_row() {
        let (registry, merchants, _, _) = registry();

        // Another writer sneaks in between lookup and insert.
        let winner = MerchantCoupon::new(
            MerchantCouponId::new(),
            "disc_winner",
            500,
            DiscountClass::Credit,
        );
        *merchants.steal_insert.lock().unwrap() = Some(winner.clone());

        let result = registry
            .find_or_create_merchant_coupon(500, DiscountClass::Credit)
            .await
            .unwrap();

        assert_eq!(result.id, winner.id);
        assert_eq!(result.provider_discount_id, "disc_winner");
        assert_eq!(merchants.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn credit_coupon_is_single_use_and_restricted() {
        let (registry, _, coupons, _) = registry();
        let product = ProductId::new();

        let merchant = registry
            .find_or_create_merchant_coupon(30000, DiscountClass::Credit)
            .await
            .unwrap();
        let coupon = registry
            .find_or_create_credit_coupon(merchant.id, product, 30000)
            .await
            .unwrap();

        assert_eq!(coupon.max_uses, 1);
        assert_eq!(coupon.restricted_to_product_id, Some(product));
        assert!(coupon.eligibility_condition.is_some());

        let again = registry
            .find_or_create_credit_coupon(merchant.id, product, 30000)
            .await
            .unwrap();
        assert_eq!(coupon.id, again.id);
        assert_eq!(coupons.rows.lock().unwrap().len(), 1);
    }
}
