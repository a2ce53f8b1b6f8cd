use crate::config::QuotaConfig;
use crate::entities::{prelude::*, users};
use chrono::{DateTime, Datelike, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

#[derive(Debug, Clone, Copy)]
pub struct UsageStatus {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
}

/// Whole calendar months between `start` and `now`; never negative.
fn whole_months_between(start: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let mut months =
        (now.year() - start.year()) * 12 + (now.month() as i32 - start.month() as i32);
    if now.day() < start.day() {
        months -= 1;
    }
    months.max(0)
}

fn is_academic_email(email: &str, domains: &[String]) -> bool {
    let Some(domain) = email.rsplit('@').next() else {
        return false;
    };
    let domain = domain.to_ascii_lowercase();
    domains
        .iter()
        .any(|suffix| domain.ends_with(suffix.as_str()))
}

/// Tracks the monthly conversation counter per user and decides whether a
/// new conversation may be started. Quota meters conversations, not
/// messages: the counter moves only when a conversation is created.
pub struct UsageLimiter {
    db: DatabaseConnection,
    quotas: QuotaConfig,
}

impl UsageLimiter {
    pub fn new(db: DatabaseConnection, quotas: QuotaConfig) -> Self {
        Self { db, quotas }
    }

    /// Effective quota, derived from plan and the academic-email override.
    pub fn limit_for(&self, user: &users::Model) -> u32 {
        if is_academic_email(&user.email, &self.quotas.academic_domains) {
            return self.quotas.academic;
        }
        match user.subscription_plan.as_str() {
            "premium" => self.quotas.premium,
            "standard" => self.quotas.standard,
            _ => self.quotas.free,
        }
    }

    /// Check the counter against the user's quota, resetting it first when
    /// the billing month has rolled over. A rollover allows the call
    /// unconditionally.
    pub async fn check_and_maybe_reset(
        &self,
        user: &users::Model,
    ) -> Result<UsageStatus, DbErr> {
        let limit = self.limit_for(user);
        let now = Utc::now();

        if whole_months_between(user.billing_period_start, now) >= 1 {
            let mut active: users::ActiveModel = user.clone().into();
            active.conversations_this_month = Set(0);
            active.billing_period_start = Set(now);
            active.update(&self.db).await?;

            return Ok(UsageStatus {
                allowed: true,
                used: 0,
                limit,
            });
        }

        let used = user.conversations_this_month.max(0) as u32;
        Ok(UsageStatus {
            allowed: used < limit,
            used,
            limit,
        })
    }

    /// Atomic `used = used + 1`. Called exactly once per created
    /// conversation, never on follow-up turns.
    pub async fn record_conversation(&self, user_id: &str) -> Result<(), DbErr> {
        Users::update_many()
            .col_expr(
                users::Column::ConversationsThisMonth,
                Expr::col(users::Column::ConversationsThisMonth).add(1),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
