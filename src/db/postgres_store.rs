// Postgres implementation of the affiliate store (diesel-async over bb8)

use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::diesel_pool::DieselPool;
use super::retry::{run_read, run_write, RetryPolicy};
use super::store::{
    AffiliateStore, ApplicationOutcome, PayoutReservation, ProductCatalog, StoreError,
    StoreResult, Transition,
};
use crate::models::{
    AffiliateLink, AffiliatePayout, AffiliateProfile, AffiliateReferral, AffiliateStatus,
    ClientMeta, NewAffiliateLink, NewAffiliatePayout, NewAffiliateProfile, NewAffiliateReferral,
    NewClickEvent, PayoutSettlement, PayoutStatus, ProductRef, ReferralStatus,
};
use crate::schema::{
    affiliate_clicks, affiliate_links, affiliate_payouts, affiliate_profiles, affiliate_referrals,
    orders, products,
};

type PgPooled<'a> = PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone)]
pub struct PostgresStore {
    pool: DieselPool,
    policy: RetryPolicy,
}

impl PostgresStore {
    pub fn new(pool: DieselPool, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    async fn conn(&self) -> StoreResult<PgPooled<'_>> {
        Ok(self.pool.get().await?)
    }
}

/// Resolve the outcome of a conditional update that matched no row
fn classify<T>(
    current: Option<T>,
    is_target: impl FnOnce(&T) -> bool,
) -> Transition<T> {
    match current {
        None => Transition::NotFound,
        Some(row) if is_target(&row) => Transition::Unchanged(row),
        Some(row) => Transition::Rejected(row),
    }
}

#[async_trait]
impl AffiliateStore for PostgresStore {
    // =========================================================================
    // PROFILES
    // =========================================================================

    #[instrument(skip(self, new), fields(user_id = %new.user_id))]
    async fn create_application(&self, new: NewAffiliateProfile) -> StoreResult<ApplicationOutcome> {
        run_write(&self.policy, "create_application", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let inserted: Option<AffiliateProfile> =
                            diesel::insert_into(affiliate_profiles::table)
                                .values(&new)
                                .on_conflict(affiliate_profiles::user_id)
                                .do_nothing()
                                .returning(AffiliateProfile::as_returning())
                                .get_result(conn)
                                .await
                                .optional()?;
                        if let Some(profile) = inserted {
                            return Ok(ApplicationOutcome::Created(profile));
                        }

                        let reapplied: Option<AffiliateProfile> = diesel::update(
                            affiliate_profiles::table.find(new.user_id).filter(
                                affiliate_profiles::status.eq(AffiliateStatus::Rejected.as_str()),
                            ),
                        )
                        .set((
                            affiliate_profiles::status.eq(AffiliateStatus::Pending.as_str()),
                            affiliate_profiles::email.eq(new.email.clone()),
                            affiliate_profiles::full_name.eq(new.full_name.clone()),
                            affiliate_profiles::payment_method.eq(new.payment_method.clone()),
                            affiliate_profiles::bank_details.eq(new.bank_details.clone()),
                            affiliate_profiles::applied_at.eq(new.applied_at),
                            affiliate_profiles::updated_at.eq(new.updated_at),
                        ))
                        .returning(AffiliateProfile::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;
                        if let Some(profile) = reapplied {
                            return Ok(ApplicationOutcome::Reapplied(profile));
                        }

                        let existing: AffiliateProfile = affiliate_profiles::table
                            .find(new.user_id)
                            .select(AffiliateProfile::as_select())
                            .first(conn)
                            .await?;
                        Ok(ApplicationOutcome::Exists(existing))
                    })
                })
                .await
        })
        .await
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<AffiliateProfile>> {
        run_read(&self.policy, "find_profile", || async move {
            let mut conn = self.conn().await?;
            Ok(affiliate_profiles::table
                .find(user_id)
                .select(AffiliateProfile::as_select())
                .first(&mut conn)
                .await
                .optional()?)
        })
        .await
    }

    async fn find_approved_by_code(&self, code: &str) -> StoreResult<Option<AffiliateProfile>> {
        run_read(&self.policy, "find_approved_by_code", || async move {
            let mut conn = self.conn().await?;
            Ok(affiliate_profiles::table
                .filter(affiliate_profiles::affiliate_code.eq(code))
                .filter(affiliate_profiles::status.eq(AffiliateStatus::Approved.as_str()))
                .select(AffiliateProfile::as_select())
                .first(&mut conn)
                .await
                .optional()?)
        })
        .await
    }

    async fn affiliate_code_exists(&self, code: &str) -> StoreResult<bool> {
        run_read(&self.policy, "affiliate_code_exists", || async move {
            let mut conn = self.conn().await?;
            Ok(diesel::select(diesel::dsl::exists(
                affiliate_profiles::table.filter(affiliate_profiles::affiliate_code.eq(code)),
            ))
            .get_result::<bool>(&mut conn)
            .await?)
        })
        .await
    }

    async fn list_profiles(
        &self,
        status: Option<AffiliateStatus>,
    ) -> StoreResult<Vec<AffiliateProfile>> {
        run_read(&self.policy, "list_profiles", || async move {
            let mut conn = self.conn().await?;
            let mut query = affiliate_profiles::table
                .select(AffiliateProfile::as_select())
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(affiliate_profiles::status.eq(status.as_str()));
            }
            Ok(query
                .order(affiliate_profiles::applied_at.desc())
                .load(&mut conn)
                .await?)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn approve_profile(
        &self,
        user_id: Uuid,
        affiliate_code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>> {
        run_write(&self.policy, "approve_profile", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let updated: Option<AffiliateProfile> = diesel::update(
                            affiliate_profiles::table.find(user_id).filter(
                                affiliate_profiles::status.eq_any([
                                    AffiliateStatus::Pending.as_str(),
                                    AffiliateStatus::Suspended.as_str(),
                                ]),
                            ),
                        )
                        .set((
                            affiliate_profiles::status.eq(AffiliateStatus::Approved.as_str()),
                            affiliate_profiles::affiliate_code.eq(Some(affiliate_code)),
                            affiliate_profiles::approved_at.eq(Some(now)),
                            affiliate_profiles::updated_at.eq(now),
                        ))
                        .returning(AffiliateProfile::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        if let Some(profile) = updated {
                            return Ok(Transition::Applied(profile));
                        }

                        let current: Option<AffiliateProfile> = affiliate_profiles::table
                            .find(user_id)
                            .select(AffiliateProfile::as_select())
                            .first(conn)
                            .await
                            .optional()?;
                        Ok(classify(current, |p| p.is_approved()))
                    })
                })
                .await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn reject_profile(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>> {
        run_write(&self.policy, "reject_profile", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let updated: Option<AffiliateProfile> = diesel::update(
                            affiliate_profiles::table.find(user_id).filter(
                                affiliate_profiles::status.eq(AffiliateStatus::Pending.as_str()),
                            ),
                        )
                        .set((
                            affiliate_profiles::status.eq(AffiliateStatus::Rejected.as_str()),
                            affiliate_profiles::affiliate_code.eq(None::<String>),
                            affiliate_profiles::updated_at.eq(now),
                        ))
                        .returning(AffiliateProfile::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        if let Some(profile) = updated {
                            return Ok(Transition::Applied(profile));
                        }

                        let current: Option<AffiliateProfile> = affiliate_profiles::table
                            .find(user_id)
                            .select(AffiliateProfile::as_select())
                            .first(conn)
                            .await
                            .optional()?;
                        Ok(classify(current, |p| {
                            p.status() == Some(AffiliateStatus::Rejected)
                        }))
                    })
                })
                .await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn suspend_profile(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>> {
        run_write(&self.policy, "suspend_profile", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let updated: Option<AffiliateProfile> = diesel::update(
                            affiliate_profiles::table.find(user_id).filter(
                                affiliate_profiles::status.eq(AffiliateStatus::Approved.as_str()),
                            ),
                        )
                        .set((
                            affiliate_profiles::status.eq(AffiliateStatus::Suspended.as_str()),
                            affiliate_profiles::affiliate_code.eq(None::<String>),
                            affiliate_profiles::updated_at.eq(now),
                        ))
                        .returning(AffiliateProfile::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        match updated {
                            Some(profile) => {
                                let deactivated = diesel::update(
                                    affiliate_links::table
                                        .filter(affiliate_links::affiliate_id.eq(user_id))
                                        .filter(affiliate_links::is_active.eq(true)),
                                )
                                .set((
                                    affiliate_links::is_active.eq(false),
                                    affiliate_links::updated_at.eq(now),
                                ))
                                .execute(conn)
                                .await?;
                                debug!(deactivated, "Deactivated links of suspended affiliate");
                                Ok(Transition::Applied(profile))
                            },
                            None => {
                                let current: Option<AffiliateProfile> = affiliate_profiles::table
                                    .find(user_id)
                                    .select(AffiliateProfile::as_select())
                                    .first(conn)
                                    .await
                                    .optional()?;
                                Ok(classify(current, |p| {
                                    p.status() == Some(AffiliateStatus::Suspended)
                                }))
                            },
                        }
                    })
                })
                .await
        })
        .await
    }

    async fn update_commission_rate(&self, user_id: Uuid, rate: i32) -> StoreResult<()> {
        run_write(&self.policy, "update_commission_rate", async move {
            let mut conn = self.conn().await?;
            diesel::update(affiliate_profiles::table.find(user_id))
                .set((
                    affiliate_profiles::commission_rate.eq(rate),
                    affiliate_profiles::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    async fn link_code_exists(&self, code: &str) -> StoreResult<bool> {
        run_read(&self.policy, "link_code_exists", || async move {
            let mut conn = self.conn().await?;
            Ok(diesel::select(diesel::dsl::exists(
                affiliate_links::table.filter(affiliate_links::link_code.eq(code)),
            ))
            .get_result::<bool>(&mut conn)
            .await?)
        })
        .await
    }

    async fn insert_link(&self, new: NewAffiliateLink) -> StoreResult<AffiliateLink> {
        run_write(&self.policy, "insert_link", async move {
            let mut conn = self.conn().await?;
            Ok(diesel::insert_into(affiliate_links::table)
                .values(&new)
                .returning(AffiliateLink::as_returning())
                .get_result(&mut conn)
                .await?)
        })
        .await
    }

    async fn list_links(&self, affiliate_id: Uuid) -> StoreResult<Vec<AffiliateLink>> {
        run_read(&self.policy, "list_links", || async move {
            let mut conn = self.conn().await?;
            Ok(affiliate_links::table
                .filter(affiliate_links::affiliate_id.eq(affiliate_id))
                .order(affiliate_links::created_at.desc())
                .select(AffiliateLink::as_select())
                .load(&mut conn)
                .await?)
        })
        .await
    }

    async fn set_link_active(
        &self,
        affiliate_id: Uuid,
        link_id: Uuid,
        active: bool,
    ) -> StoreResult<Option<AffiliateLink>> {
        run_write(&self.policy, "set_link_active", async move {
            let mut conn = self.conn().await?;
            Ok(diesel::update(
                affiliate_links::table
                    .find(link_id)
                    .filter(affiliate_links::affiliate_id.eq(affiliate_id)),
            )
            .set((
                affiliate_links::is_active.eq(active),
                affiliate_links::updated_at.eq(Utc::now()),
            ))
            .returning(AffiliateLink::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?)
        })
        .await
    }

    async fn record_click(
        &self,
        link_code: &str,
        meta: &ClientMeta,
    ) -> StoreResult<Option<AffiliateLink>> {
        run_write(&self.policy, "record_click", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let now = Utc::now();
                        let link: Option<AffiliateLink> = diesel::update(
                            affiliate_links::table
                                .filter(affiliate_links::link_code.eq(link_code))
                                .filter(affiliate_links::is_active.eq(true)),
                        )
                        .set((
                            affiliate_links::clicks.eq(affiliate_links::clicks + 1_i64),
                            affiliate_links::updated_at.eq(now),
                        ))
                        .returning(AffiliateLink::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        if let Some(link) = &link {
                            let event =
                                NewClickEvent::for_link(link.id, link.affiliate_id, link_code, meta);
                            diesel::insert_into(affiliate_clicks::table)
                                .values(&event)
                                .execute(conn)
                                .await?;
                        }
                        Ok(link)
                    })
                })
                .await
        })
        .await
    }

    // =========================================================================
    // REFERRALS
    // =========================================================================

    #[instrument(skip(self, new), fields(order_id = %new.order_id))]
    async fn insert_referral(
        &self,
        new: NewAffiliateReferral,
        affiliate_code: &str,
    ) -> StoreResult<Option<AffiliateReferral>> {
        run_write(&self.policy, "insert_referral", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let inserted: Option<AffiliateReferral> =
                            diesel::insert_into(affiliate_referrals::table)
                                .values(&new)
                                .on_conflict(affiliate_referrals::order_id)
                                .do_nothing()
                                .returning(AffiliateReferral::as_returning())
                                .get_result(conn)
                                .await
                                .optional()?;

                        if let Some(referral) = &inserted {
                            // Orders live in the storefront schema; an unknown order id is not an error
                            diesel::update(orders::table.find(&referral.order_id))
                                .set((
                                    orders::affiliate_id.eq(Some(referral.affiliate_id)),
                                    orders::referral_code.eq(Some(affiliate_code)),
                                ))
                                .execute(conn)
                                .await?;
                        }
                        Ok(inserted)
                    })
                })
                .await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn complete_referral(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateReferral>> {
        run_write(&self.policy, "complete_referral", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let updated: Option<AffiliateReferral> = diesel::update(
                            affiliate_referrals::table
                                .filter(affiliate_referrals::order_id.eq(order_id))
                                .filter(
                                    affiliate_referrals::status
                                        .eq(ReferralStatus::Pending.as_str()),
                                ),
                        )
                        .set((
                            affiliate_referrals::status.eq(ReferralStatus::Completed.as_str()),
                            affiliate_referrals::updated_at.eq(now),
                        ))
                        .returning(AffiliateReferral::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        let Some(referral) = updated else {
                            let current: Option<AffiliateReferral> = affiliate_referrals::table
                                .filter(affiliate_referrals::order_id.eq(order_id))
                                .select(AffiliateReferral::as_select())
                                .first(conn)
                                .await
                                .optional()?;
                            return Ok(classify(current, |r| {
                                r.status() == Some(ReferralStatus::Completed)
                            }));
                        };

                        let commission = referral.commission_amount;
                        diesel::update(affiliate_profiles::table.find(referral.affiliate_id))
                            .set((
                                affiliate_profiles::total_earnings
                                    .eq(affiliate_profiles::total_earnings + commission),
                                affiliate_profiles::pending_earnings
                                    .eq(affiliate_profiles::pending_earnings + commission),
                                affiliate_profiles::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;

                        if let Some(link_code) = &referral.link_code {
                            diesel::update(
                                affiliate_links::table
                                    .filter(affiliate_links::link_code.eq(link_code))
                                    .filter(affiliate_links::affiliate_id.eq(referral.affiliate_id)),
                            )
                            .set((
                                affiliate_links::conversions
                                    .eq(affiliate_links::conversions + 1_i64),
                                affiliate_links::commission_earned
                                    .eq(affiliate_links::commission_earned + commission),
                                affiliate_links::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;
                        }

                        Ok(Transition::Applied(referral))
                    })
                })
                .await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn cancel_referral(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateReferral>> {
        run_write(&self.policy, "cancel_referral", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let updated: Option<AffiliateReferral> = diesel::update(
                            affiliate_referrals::table
                                .filter(affiliate_referrals::order_id.eq(order_id))
                                .filter(
                                    affiliate_referrals::status
                                        .eq(ReferralStatus::Pending.as_str()),
                                ),
                        )
                        .set((
                            affiliate_referrals::status.eq(ReferralStatus::Cancelled.as_str()),
                            affiliate_referrals::updated_at.eq(now),
                        ))
                        .returning(AffiliateReferral::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        if let Some(referral) = updated {
                            return Ok(Transition::Applied(referral));
                        }

                        let current: Option<AffiliateReferral> = affiliate_referrals::table
                            .filter(affiliate_referrals::order_id.eq(order_id))
                            .select(AffiliateReferral::as_select())
                            .first(conn)
                            .await
                            .optional()?;
                        Ok(classify(current, |r| {
                            r.status() == Some(ReferralStatus::Cancelled)
                        }))
                    })
                })
                .await
        })
        .await
    }

    async fn list_referrals(
        &self,
        affiliate_id: Uuid,
        status: Option<ReferralStatus>,
    ) -> StoreResult<Vec<AffiliateReferral>> {
        run_read(&self.policy, "list_referrals", || async move {
            let mut conn = self.conn().await?;
            let mut query = affiliate_referrals::table
                .filter(affiliate_referrals::affiliate_id.eq(affiliate_id))
                .select(AffiliateReferral::as_select())
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(affiliate_referrals::status.eq(status.as_str()));
            }
            Ok(query
                .order(affiliate_referrals::created_at.desc())
                .load(&mut conn)
                .await?)
        })
        .await
    }

    async fn count_completed_referrals(&self, affiliate_id: Uuid) -> StoreResult<i64> {
        run_read(&self.policy, "count_completed_referrals", || async move {
            let mut conn = self.conn().await?;
            Ok(affiliate_referrals::table
                .filter(affiliate_referrals::affiliate_id.eq(affiliate_id))
                .filter(affiliate_referrals::status.eq(ReferralStatus::Completed.as_str()))
                .count()
                .get_result::<i64>(&mut conn)
                .await?)
        })
        .await
    }

    // =========================================================================
    // PAYOUTS
    // =========================================================================

    #[instrument(skip(self, new), fields(affiliate_id = %new.affiliate_id, amount = new.amount))]
    async fn reserve_payout(&self, new: NewAffiliatePayout) -> StoreResult<PayoutReservation> {
        run_write(&self.policy, "reserve_payout", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let remaining: Option<i64> = diesel::update(
                            affiliate_profiles::table
                                .find(new.affiliate_id)
                                .filter(affiliate_profiles::pending_earnings.ge(new.amount)),
                        )
                        .set((
                            affiliate_profiles::pending_earnings
                                .eq(affiliate_profiles::pending_earnings - new.amount),
                            affiliate_profiles::updated_at.eq(new.updated_at),
                        ))
                        .returning(affiliate_profiles::pending_earnings)
                        .get_result(conn)
                        .await
                        .optional()?;

                        if remaining.is_none() {
                            let available: Option<i64> = affiliate_profiles::table
                                .find(new.affiliate_id)
                                .select(affiliate_profiles::pending_earnings)
                                .first(conn)
                                .await
                                .optional()?;
                            return Ok(match available {
                                Some(available) => {
                                    PayoutReservation::InsufficientBalance { available }
                                },
                                None => PayoutReservation::ProfileNotFound,
                            });
                        }

                        let payout: AffiliatePayout = diesel::insert_into(affiliate_payouts::table)
                            .values(&new)
                            .returning(AffiliatePayout::as_returning())
                            .get_result(conn)
                            .await?;
                        Ok(PayoutReservation::Reserved(payout))
                    })
                })
                .await
        })
        .await
    }

    #[instrument(skip(self))]
    async fn settle_payout(
        &self,
        payout_id: Uuid,
        settlement: &PayoutSettlement,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliatePayout>> {
        run_write(&self.policy, "settle_payout", async move {
            let mut conn = self.conn().await?;
            conn.build_transaction()
                .run::<_, StoreError, _>(|conn| {
                    Box::pin(async move {
                        let allowed: Vec<&str> =
                            settlement.allowed_from().iter().map(|s| s.as_str()).collect();

                        let updated: Option<AffiliatePayout> = diesel::update(
                            affiliate_payouts::table
                                .find(payout_id)
                                .filter(affiliate_payouts::status.eq_any(allowed)),
                        )
                        .set(settlement.change(now))
                        .returning(AffiliatePayout::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        let Some(payout) = updated else {
                            let current: Option<AffiliatePayout> = affiliate_payouts::table
                                .find(payout_id)
                                .select(AffiliatePayout::as_select())
                                .first(conn)
                                .await
                                .optional()?;
                            let target = settlement.target_status();
                            return Ok(classify(current, |p| p.status() == Some(target)));
                        };

                        match settlement {
                            PayoutSettlement::Failed => {
                                diesel::update(affiliate_profiles::table.find(payout.affiliate_id))
                                    .set((
                                        affiliate_profiles::pending_earnings
                                            .eq(affiliate_profiles::pending_earnings + payout.amount),
                                        affiliate_profiles::updated_at.eq(now),
                                    ))
                                    .execute(conn)
                                    .await?;
                            },
                            PayoutSettlement::Completed { .. } => {
                                let unpaid: Vec<(Uuid, i64)> = affiliate_referrals::table
                                    .filter(affiliate_referrals::affiliate_id.eq(payout.affiliate_id))
                                    .filter(
                                        affiliate_referrals::status
                                            .eq(ReferralStatus::Completed.as_str()),
                                    )
                                    .filter(affiliate_referrals::paid_at.is_null())
                                    .order(affiliate_referrals::created_at.asc())
                                    .select((
                                        affiliate_referrals::id,
                                        affiliate_referrals::commission_amount,
                                    ))
                                    .load(conn)
                                    .await?;

                                let settled: Vec<i64> = affiliate_payouts::table
                                    .filter(affiliate_payouts::affiliate_id.eq(payout.affiliate_id))
                                    .filter(
                                        affiliate_payouts::status
                                            .eq(PayoutStatus::Completed.as_str()),
                                    )
                                    .select(affiliate_payouts::amount)
                                    .load(conn)
                                    .await?;
                                let marked: Vec<i64> = affiliate_referrals::table
                                    .filter(affiliate_referrals::affiliate_id.eq(payout.affiliate_id))
                                    .filter(affiliate_referrals::paid_at.is_not_null())
                                    .select(affiliate_referrals::commission_amount)
                                    .load(conn)
                                    .await?;

                                let budget = unmarked_payout_total(&settled, &marked);
                                let covered = covered_referrals(&unpaid, budget);
                                if !covered.is_empty() {
                                    diesel::update(
                                        affiliate_referrals::table
                                            .filter(affiliate_referrals::id.eq_any(&covered)),
                                    )
                                    .set((
                                        affiliate_referrals::paid_at.eq(Some(now)),
                                        affiliate_referrals::updated_at.eq(now),
                                    ))
                                    .execute(conn)
                                    .await?;
                                }
                            },
                            PayoutSettlement::Processing => {},
                        }

                        Ok(Transition::Applied(payout))
                    })
                })
                .await
        })
        .await
    }

    async fn list_payouts(&self, affiliate_id: Uuid) -> StoreResult<Vec<AffiliatePayout>> {
        run_read(&self.policy, "list_payouts", || async move {
            let mut conn = self.conn().await?;
            Ok(affiliate_payouts::table
                .filter(affiliate_payouts::affiliate_id.eq(affiliate_id))
                .order(affiliate_payouts::created_at.desc())
                .select(AffiliatePayout::as_select())
                .load(&mut conn)
                .await?)
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        run_read(&self.policy, "health_check", || async move {
            let mut conn = self.conn().await?;
            diesel::sql_query("SELECT 1").execute(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn find_product(&self, product_id: &str) -> StoreResult<Option<ProductRef>> {
        run_read(&self.policy, "find_product", || async move {
            let mut conn = self.conn().await?;
            Ok(products::table
                .find(product_id)
                .select(ProductRef::as_select())
                .first(&mut conn)
                .await
                .optional()?)
        })
        .await
    }
}

/// Completed payout money not yet matched to paid referrals. A payout that
/// stops short of the next commission leaves its remainder here for the
/// following payout to use.
pub fn unmarked_payout_total(completed_payouts: &[i64], paid_commissions: &[i64]) -> i64 {
    let paid_out: i64 = completed_payouts.iter().sum();
    let marked: i64 = paid_commissions.iter().sum();
    (paid_out - marked).max(0)
}

/// Oldest-first referrals whose commissions fit inside `amount`
pub fn covered_referrals(unpaid: &[(Uuid, i64)], amount: i64) -> Vec<Uuid> {
    let mut remaining = amount;
    let mut covered = Vec::new();
    for (id, commission) in unpaid {
        if *commission > remaining {
            break;
        }
        remaining -= commission;
        covered.push(*id);
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covered_referrals_stops_at_first_overflow() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let unpaid = vec![(a, 3_000), (b, 4_000), (c, 500)];

        assert_eq!(covered_referrals(&unpaid, 7_000), vec![a, b]);
        assert_eq!(covered_referrals(&unpaid, 6_999), vec![a]);
        assert!(covered_referrals(&unpaid, 100).is_empty());
    }

    #[test]
    fn test_payout_remainder_carries_into_next_settlement() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let unpaid = vec![(a, 3_000), (b, 4_000)];

        // First payout of 5,000 covers `a` and leaves 2,000 unmatched
        let budget = unmarked_payout_total(&[5_000], &[]);
        assert_eq!(covered_referrals(&unpaid, budget), vec![a]);

        // A second 2,000 payout plus the remainder covers `b`
        let budget = unmarked_payout_total(&[5_000, 2_000], &[3_000]);
        assert_eq!(budget, 4_000);
        assert_eq!(covered_referrals(&unpaid[1..], budget), vec![b]);

        assert_eq!(unmarked_payout_total(&[1_000], &[3_000]), 0);
    }
}
