// In-memory affiliate store for tests and local runs
//
// One mutex guards all state, so every operation observes and applies its
// changes atomically, mirroring the transactional Postgres store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::postgres_store::{covered_referrals, unmarked_payout_total};
use super::store::{
    AffiliateStore, ApplicationOutcome, PayoutReservation, ProductCatalog, StoreError,
    StoreResult, Transition,
};
use crate::models::{
    AffiliateLink, AffiliatePayout, AffiliateProfile, AffiliateReferral, AffiliateStatus,
    ClickEvent, ClientMeta, NewAffiliateLink, NewAffiliatePayout, NewAffiliateProfile,
    NewAffiliateReferral, NewClickEvent, PayoutSettlement, PayoutStatus, ProductRef,
    ReferralStatus,
};

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<Uuid, AffiliateProfile>,
    links: Vec<AffiliateLink>,
    clicks: Vec<ClickEvent>,
    referrals: Vec<AffiliateReferral>,
    payouts: Vec<AffiliatePayout>,
    products: HashMap<String, ProductRef>,
    /// order id -> (affiliate id, referral code)
    order_stamps: HashMap<String, (Uuid, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: ProductRef) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.products.insert(product.id.clone(), product);
    }

    /// Place a profile as-is, bypassing the lifecycle
    pub async fn insert_profile(&self, profile: AffiliateProfile) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.profiles.insert(profile.user_id, profile);
    }

    pub async fn click_events(&self) -> Vec<ClickEvent> {
        self.state.lock().await.clicks.clone()
    }

    pub async fn order_stamp(&self, order_id: &str) -> Option<(Uuid, String)> {
        self.state.lock().await.order_stamps.get(order_id).cloned()
    }
}

fn clone_matching<T: Clone>(items: &[T], predicate: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| predicate(item)).cloned().collect()
}

#[async_trait]
impl AffiliateStore for MemoryStore {
    async fn create_application(&self, new: NewAffiliateProfile) -> StoreResult<ApplicationOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match state.profiles.get_mut(&new.user_id) {
            None => {
                let profile = new.into_profile();
                state.profiles.insert(profile.user_id, profile.clone());
                Ok(ApplicationOutcome::Created(profile))
            },
            Some(existing) if existing.status() == Some(AffiliateStatus::Rejected) => {
                existing.status = AffiliateStatus::Pending.as_str().to_string();
                existing.email = new.email;
                existing.full_name = new.full_name;
                existing.payment_method = new.payment_method;
                existing.bank_details = new.bank_details;
                existing.applied_at = new.applied_at;
                existing.updated_at = new.updated_at;
                Ok(ApplicationOutcome::Reapplied(existing.clone()))
            },
            Some(existing) => Ok(ApplicationOutcome::Exists(existing.clone())),
        }
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<AffiliateProfile>> {
        Ok(self.state.lock().await.profiles.get(&user_id).cloned())
    }

    async fn find_approved_by_code(&self, code: &str) -> StoreResult<Option<AffiliateProfile>> {
        let state = self.state.lock().await;
        Ok(state
            .profiles
            .values()
            .find(|p| p.affiliate_code.as_deref() == Some(code) && p.is_approved())
            .cloned())
    }

    async fn affiliate_code_exists(&self, code: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .profiles
            .values()
            .any(|p| p.affiliate_code.as_deref() == Some(code)))
    }

    async fn list_profiles(
        &self,
        status: Option<AffiliateStatus>,
    ) -> StoreResult<Vec<AffiliateProfile>> {
        let state = self.state.lock().await;
        let mut profiles: Vec<AffiliateProfile> = state
            .profiles
            .values()
            .filter(|p| status.map_or(true, |s| p.status() == Some(s)))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(profiles)
    }

    async fn approve_profile(
        &self,
        user_id: Uuid,
        affiliate_code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let code_taken = state
            .profiles
            .values()
            .any(|p| p.affiliate_code.as_deref() == Some(affiliate_code));

        let Some(profile) = state.profiles.get_mut(&user_id) else {
            return Ok(Transition::NotFound);
        };

        match profile.status() {
            Some(AffiliateStatus::Pending) | Some(AffiliateStatus::Suspended) => {
                if code_taken {
                    return Err(StoreError::UniqueViolation(
                        "affiliate_profiles_affiliate_code_key".to_string(),
                    ));
                }
                profile.status = AffiliateStatus::Approved.as_str().to_string();
                profile.affiliate_code = Some(affiliate_code.to_string());
                profile.approved_at = Some(now);
                profile.updated_at = now;
                Ok(Transition::Applied(profile.clone()))
            },
            Some(AffiliateStatus::Approved) => Ok(Transition::Unchanged(profile.clone())),
            _ => Ok(Transition::Rejected(profile.clone())),
        }
    }

    async fn reject_profile(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(profile) = state.profiles.get_mut(&user_id) else {
            return Ok(Transition::NotFound);
        };

        match profile.status() {
            Some(AffiliateStatus::Pending) => {
                profile.status = AffiliateStatus::Rejected.as_str().to_string();
                profile.affiliate_code = None;
                profile.updated_at = now;
                Ok(Transition::Applied(profile.clone()))
            },
            Some(AffiliateStatus::Rejected) => Ok(Transition::Unchanged(profile.clone())),
            _ => Ok(Transition::Rejected(profile.clone())),
        }
    }

    async fn suspend_profile(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateProfile>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(profile) = state.profiles.get_mut(&user_id) else {
            return Ok(Transition::NotFound);
        };

        match profile.status() {
            Some(AffiliateStatus::Approved) => {
                profile.status = AffiliateStatus::Suspended.as_str().to_string();
                profile.affiliate_code = None;
                profile.updated_at = now;
                let suspended = profile.clone();

                for link in state.links.iter_mut().filter(|l| l.affiliate_id == user_id) {
                    if link.is_active {
                        link.is_active = false;
                        link.updated_at = now;
                    }
                }
                Ok(Transition::Applied(suspended))
            },
            Some(AffiliateStatus::Suspended) => Ok(Transition::Unchanged(profile.clone())),
            _ => Ok(Transition::Rejected(profile.clone())),
        }
    }

    async fn update_commission_rate(&self, user_id: Uuid, rate: i32) -> StoreResult<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.commission_rate = rate;
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn link_code_exists(&self, code: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.links.iter().any(|l| l.link_code == code))
    }

    async fn insert_link(&self, new: NewAffiliateLink) -> StoreResult<AffiliateLink> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.links.iter().any(|l| l.link_code == new.link_code) {
            return Err(StoreError::UniqueViolation(
                "affiliate_links_link_code_key".to_string(),
            ));
        }
        let link = new.into_link();
        state.links.push(link.clone());
        Ok(link)
    }

    async fn list_links(&self, affiliate_id: Uuid) -> StoreResult<Vec<AffiliateLink>> {
        let state = self.state.lock().await;
        let mut links = clone_matching(&state.links, |l| l.affiliate_id == affiliate_id);
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn set_link_active(
        &self,
        affiliate_id: Uuid,
        link_id: Uuid,
        active: bool,
    ) -> StoreResult<Option<AffiliateLink>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        Ok(state
            .links
            .iter_mut()
            .find(|l| l.id == link_id && l.affiliate_id == affiliate_id)
            .map(|link| {
                link.is_active = active;
                link.updated_at = Utc::now();
                link.clone()
            }))
    }

    async fn record_click(
        &self,
        link_code: &str,
        meta: &ClientMeta,
    ) -> StoreResult<Option<AffiliateLink>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(link) = state
            .links
            .iter_mut()
            .find(|l| l.link_code == link_code && l.is_active)
        else {
            return Ok(None);
        };

        link.clicks += 1;
        link.updated_at = Utc::now();
        let link = link.clone();

        let event = NewClickEvent::for_link(link.id, link.affiliate_id, link_code, meta);
        state.clicks.push(ClickEvent {
            id: event.id,
            link_id: event.link_id,
            affiliate_id: event.affiliate_id,
            link_code: event.link_code,
            customer_ip: event.customer_ip,
            user_agent: event.user_agent,
            referrer_url: event.referrer_url,
            created_at: event.created_at,
        });
        Ok(Some(link))
    }

    async fn insert_referral(
        &self,
        new: NewAffiliateReferral,
        affiliate_code: &str,
    ) -> StoreResult<Option<AffiliateReferral>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.referrals.iter().any(|r| r.order_id == new.order_id) {
            return Ok(None);
        }

        let referral = new.into_referral();
        state.order_stamps.insert(
            referral.order_id.clone(),
            (referral.affiliate_id, affiliate_code.to_string()),
        );
        state.referrals.push(referral.clone());
        Ok(Some(referral))
    }

    async fn complete_referral(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateReferral>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(referral) = state.referrals.iter_mut().find(|r| r.order_id == order_id) else {
            return Ok(Transition::NotFound);
        };

        match referral.status() {
            Some(ReferralStatus::Pending) => {
                referral.status = ReferralStatus::Completed.as_str().to_string();
                referral.updated_at = now;
                let completed = referral.clone();
                let commission = completed.commission_amount;

                if let Some(profile) = state.profiles.get_mut(&completed.affiliate_id) {
                    profile.total_earnings += commission;
                    profile.pending_earnings += commission;
                    profile.updated_at = now;
                }
                if let Some(code) = &completed.link_code {
                    if let Some(link) = state
                        .links
                        .iter_mut()
                        .find(|l| &l.link_code == code && l.affiliate_id == completed.affiliate_id)
                    {
                        link.conversions += 1;
                        link.commission_earned += commission;
                        link.updated_at = now;
                    }
                }
                Ok(Transition::Applied(completed))
            },
            Some(ReferralStatus::Completed) => Ok(Transition::Unchanged(referral.clone())),
            _ => Ok(Transition::Rejected(referral.clone())),
        }
    }

    async fn cancel_referral(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliateReferral>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(referral) = state.referrals.iter_mut().find(|r| r.order_id == order_id) else {
            return Ok(Transition::NotFound);
        };

        match referral.status() {
            Some(ReferralStatus::Pending) => {
                referral.status = ReferralStatus::Cancelled.as_str().to_string();
                referral.updated_at = now;
                Ok(Transition::Applied(referral.clone()))
            },
            Some(ReferralStatus::Cancelled) => Ok(Transition::Unchanged(referral.clone())),
            _ => Ok(Transition::Rejected(referral.clone())),
        }
    }

    async fn list_referrals(
        &self,
        affiliate_id: Uuid,
        status: Option<ReferralStatus>,
    ) -> StoreResult<Vec<AffiliateReferral>> {
        let state = self.state.lock().await;
        let mut referrals = clone_matching(&state.referrals, |r| {
            r.affiliate_id == affiliate_id && status.map_or(true, |s| r.status() == Some(s))
        });
        referrals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(referrals)
    }

    async fn count_completed_referrals(&self, affiliate_id: Uuid) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .iter()
            .filter(|r| {
                r.affiliate_id == affiliate_id && r.status() == Some(ReferralStatus::Completed)
            })
            .count() as i64)
    }

    async fn reserve_payout(&self, new: NewAffiliatePayout) -> StoreResult<PayoutReservation> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(profile) = state.profiles.get_mut(&new.affiliate_id) else {
            return Ok(PayoutReservation::ProfileNotFound);
        };

        if profile.pending_earnings < new.amount {
            return Ok(PayoutReservation::InsufficientBalance {
                available: profile.pending_earnings,
            });
        }

        profile.pending_earnings -= new.amount;
        profile.updated_at = new.updated_at;

        let payout = new.into_payout();
        state.payouts.push(payout.clone());
        Ok(PayoutReservation::Reserved(payout))
    }

    async fn settle_payout(
        &self,
        payout_id: Uuid,
        settlement: &PayoutSettlement,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition<AffiliatePayout>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(payout) = state.payouts.iter_mut().find(|p| p.id == payout_id) else {
            return Ok(Transition::NotFound);
        };

        let current = payout.status();
        let target = settlement.target_status();
        if !current.is_some_and(|s| settlement.allowed_from().contains(&s)) {
            return Ok(if current == Some(target) {
                Transition::Unchanged(payout.clone())
            } else {
                Transition::Rejected(payout.clone())
            });
        }

        let change = settlement.change(now);
        payout.status = change.status;
        if change.transaction_ref.is_some() {
            payout.transaction_ref = change.transaction_ref;
        }
        if change.processed_at.is_some() {
            payout.processed_at = change.processed_at;
        }
        payout.updated_at = now;
        let settled = payout.clone();

        match settlement {
            PayoutSettlement::Failed => {
                if let Some(profile) = state.profiles.get_mut(&settled.affiliate_id) {
                    profile.pending_earnings += settled.amount;
                    profile.updated_at = now;
                }
            },
            PayoutSettlement::Completed { .. } => {
                let mut unpaid: Vec<(DateTime<Utc>, Uuid, i64)> = state
                    .referrals
                    .iter()
                    .filter(|r| {
                        r.affiliate_id == settled.affiliate_id
                            && r.status() == Some(ReferralStatus::Completed)
                            && r.paid_at.is_none()
                    })
                    .map(|r| (r.created_at, r.id, r.commission_amount))
                    .collect();
                unpaid.sort_by_key(|(created_at, _, _)| *created_at);
                let unpaid: Vec<(Uuid, i64)> = unpaid
                    .into_iter()
                    .map(|(_, id, commission)| (id, commission))
                    .collect();

                let settled_amounts: Vec<i64> = state
                    .payouts
                    .iter()
                    .filter(|p| {
                        p.affiliate_id == settled.affiliate_id
                            && p.status() == Some(PayoutStatus::Completed)
                    })
                    .map(|p| p.amount)
                    .collect();
                let marked: Vec<i64> = state
                    .referrals
                    .iter()
                    .filter(|r| r.affiliate_id == settled.affiliate_id && r.paid_at.is_some())
                    .map(|r| r.commission_amount)
                    .collect();

                let budget = unmarked_payout_total(&settled_amounts, &marked);
                let covered = covered_referrals(&unpaid, budget);
                for referral in state.referrals.iter_mut().filter(|r| covered.contains(&r.id)) {
                    referral.paid_at = Some(now);
                    referral.updated_at = now;
                }
            },
            PayoutSettlement::Processing => {},
        }

        Ok(Transition::Applied(settled))
    }

    async fn list_payouts(&self, affiliate_id: Uuid) -> StoreResult<Vec<AffiliatePayout>> {
        let state = self.state.lock().await;
        let mut payouts = clone_matching(&state.payouts, |p| p.affiliate_id == affiliate_id);
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payouts)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn find_product(&self, product_id: &str) -> StoreResult<Option<ProductRef>> {
        Ok(self.state.lock().await.products.get(product_id).cloned())
    }
}
