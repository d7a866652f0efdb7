//! Synthetic event generator for load and demo data

use chrono::{DateTime, Duration, Utc};
use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::error::{EventError, Result};
use crate::models::CreateEvent;

/// Severity window used when only critical events are requested
pub const CRITICAL_SEVERITIES: (i32, i32) = (8, 10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Auth,
    Payment,
    Order,
    System,
    Notification,
    User,
    Analytics,
}

#[derive(Debug, Clone, Copy)]
struct Template {
    event_type: &'static str,
    source: &'static str,
    family: Family,
    severity: (i32, i32),
    weight: f64,
}

const fn template(
    event_type: &'static str,
    source: &'static str,
    family: Family,
    severity: (i32, i32),
    weight: f64,
) -> Template {
    Template {
        event_type,
        source,
        family,
        severity,
        weight,
    }
}

#[rustfmt::skip]
const TEMPLATES: &[Template] = &[
    template("USER_LOGIN_SUCCESS", "auth-service", Family::Auth, (1, 3), 30.0),
    template("USER_LOGIN_FAILED", "auth-service", Family::Auth, (4, 8), 5.0),
    template("USER_REGISTERED", "auth-service", Family::Auth, (2, 3), 3.0),
    template("PAYMENT_SUCCESS", "payment-service", Family::Payment, (1, 3), 20.0),
    template("PAYMENT_FAILED", "payment-service", Family::Payment, (6, 9), 8.0),
    template("PAYMENT_REFUNDED", "payment-service", Family::Payment, (3, 5), 2.0),
    template("ORDER_CREATED", "order-service", Family::Order, (1, 3), 25.0),
    template("ORDER_CANCELLED", "order-service", Family::Order, (4, 6), 4.0),
    template("SYSTEM_ERROR", "payment-service", Family::System, (7, 10), 1.0),
    template("RATE_LIMIT_EXCEEDED", "api-gateway", Family::System, (5, 7), 2.0),
    template("NOTIFICATION_DELIVERED", "notification-service", Family::Notification, (1, 3), 15.0),
    template("NOTIFICATION_FAILED", "notification-service", Family::Notification, (5, 8), 3.0),
    template("USER_PROFILE_UPDATED", "user-service", Family::User, (1, 3), 5.0),
    template("AB_TEST_CONVERSION", "analytics-service", Family::Analytics, (2, 4), 2.0),
];

const COUNTRIES: &[(&str, &[&str])] = &[
    ("US", &["New York", "Austin", "Seattle"]),
    ("DE", &["Berlin", "Munich", "Hamburg"]),
    ("FR", &["Paris", "Lyon"]),
    ("GB", &["London", "Manchester"]),
    ("ES", &["Madrid", "Barcelona"]),
];

const USER_POOL: usize = 50;

#[derive(Debug, Clone)]
struct User {
    user_id: String,
    email: String,
    country: &'static str,
    city: &'static str,
}

/// Candidate template with its severity clamped to the requested window
#[derive(Debug, Clone, Copy)]
struct Candidate {
    template: Template,
    severity: (i32, i32),
}

/// Produces [`CreateEvent`]s that look like traffic from a small shop.
///
/// With a seed the output is reproducible. Severity follows each template's
/// range; [`EventGenerator::criticals_only`] narrows the choice to templates
/// that can reach 8..=10 and clamps their range accordingly.
pub struct EventGenerator {
    rng: StdRng,
    users: Vec<User>,
    candidates: Vec<Candidate>,
    weights: WeightedIndex<f64>,
}

impl EventGenerator {
    pub fn new(seed: Option<u64>) -> Result<Self> {
        Self::with_severity(seed, None)
    }

    pub fn criticals_only(seed: Option<u64>) -> Result<Self> {
        Self::with_severity(seed, Some(CRITICAL_SEVERITIES))
    }

    fn with_severity(seed: Option<u64>, window: Option<(i32, i32)>) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let candidates: Vec<Candidate> = TEMPLATES
            .iter()
            .filter_map(|template| {
                let (low, high) = window.unwrap_or(template.severity);
                let severity = (template.severity.0.max(low), template.severity.1.min(high));
                (severity.0 <= severity.1).then_some(Candidate {
                    template: *template,
                    severity,
                })
            })
            .collect();

        let weights = WeightedIndex::new(candidates.iter().map(|c| c.template.weight))
            .map_err(|e| EventError::Internal(format!("no event templates to draw from: {e}")))?;

        let users = (0..USER_POOL).map(|_| random_user(&mut rng)).collect();

        Ok(Self {
            rng,
            users,
            candidates,
            weights,
        })
    }

    /// Generate `count` events stamped at `now`
    pub fn generate(&mut self, count: usize, now: DateTime<Utc>) -> Vec<CreateEvent> {
        (0..count).map(|_| self.next_event(now)).collect()
    }

    pub fn next_event(&mut self, now: DateTime<Utc>) -> CreateEvent {
        let candidate = self.candidates[self.weights.sample(&mut self.rng)];
        let template = candidate.template;
        let severity = self.rng.random_range(candidate.severity.0..=candidate.severity.1);

        let user = match template.family {
            Family::System => None,
            _ => self.users.choose(&mut self.rng).cloned(),
        };

        let mut event = CreateEvent {
            event_id: Some(self.uuid().to_string()),
            event_type: template.event_type.to_string(),
            source: template.source.to_string(),
            severity,
            timestamp: Some(now),
            user_id: user.as_ref().map(|u| u.user_id.clone()),
            session_id: user.as_ref().map(|_| format!("sess_{}", self.hex(12))),
            trace_id: Some(format!("trace_{}", self.hex(8))),
            payload: None,
            metadata: None,
        };

        let (payload, metadata) = match template.family {
            Family::Auth => self.auth(template, severity, user.as_ref()),
            Family::Payment => self.payment(template, user.as_ref()),
            Family::Order => self.order(template, user.as_ref(), now),
            Family::System => {
                if template.event_type == "RATE_LIMIT_EXCEEDED" {
                    event.user_id = Some(format!("user_{}", self.hex(8)));
                }
                self.system(template)
            }
            Family::Notification => self.notification(template, user.as_ref(), now),
            Family::User => self.profile(template),
            Family::Analytics => self.analytics(template, now),
        };
        event.payload = object(payload);
        event.metadata = object(metadata);
        event
    }

    fn uuid(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.rng.random()).into_uuid()
    }

    fn hex(&mut self, len: usize) -> String {
        self.uuid().simple().to_string()[..len].to_string()
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.rng.random_range(0..items.len())]
    }

    fn money(&mut self, low: f64, high: f64) -> f64 {
        (self.rng.random_range(low..high) * 100.0).round() / 100.0
    }

    fn version(&mut self, source: &str, major: (u32, u32)) -> String {
        format!(
            "{source}-v{}.{}.{}",
            self.rng.random_range(major.0..=major.1),
            self.rng.random_range(0..=9),
            self.rng.random_range(0..=9)
        )
    }

    fn ip(&mut self) -> String {
        let octets: [u8; 4] = self.rng.random();
        format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
    }

    fn email_or_phone(&mut self, user: Option<&User>) -> String {
        match user {
            Some(user) if self.rng.random_bool(0.5) => user.email.clone(),
            _ => format!("+1555{:07}", self.rng.random_range(0..10_000_000)),
        }
    }

    fn auth(&mut self, template: Template, severity: i32, user: Option<&User>) -> (Value, Value) {
        let email = user.map(|u| u.email.clone());
        let payload = match template.event_type {
            "USER_LOGIN_SUCCESS" => json!({
                "email": email,
                "login_method": self.pick(&["password", "oauth_google", "oauth_facebook"]),
                "remember_me": self.rng.random_bool(0.5),
                "device_fingerprint": format!("fp_{}", self.hex(8)),
                "two_factor_used": self.rng.random_bool(0.5),
            }),
            "USER_LOGIN_FAILED" => json!({
                "email": email,
                "failure_reason": self.pick(&[
                    "invalid_password",
                    "invalid_email",
                    "account_locked",
                    "suspicious_activity",
                ]),
                "attempt_number": self.rng.random_range(1..=10),
                "account_locked": self.rng.random_bool(0.5),
                "lock_duration_minutes": self.pick(&[15, 30, 60, 120]),
                "suspicious_activity": severity >= 7,
            }),
            _ => json!({
                "email": email,
                "registration_method": self.pick(&["email", "oauth_google", "oauth_facebook"]),
                "email_verified": self.rng.random_bool(0.5),
                "referral_code": self
                    .rng
                    .random_bool(0.3)
                    .then(|| format!("REF{}", self.rng.random_range(100..=999))),
                "terms_version": "v2.1",
                "account_type": self.pick(&["free", "premium"]),
            }),
        };

        let metadata = json!({
            "ip_address": self.ip(),
            "country": user.map(|u| u.country),
            "city": user.map(|u| u.city),
            "device_type": self.pick(&["desktop", "mobile", "tablet"]),
            "browser": self.pick(&["Chrome", "Firefox", "Safari", "Edge"]),
            "version": self.version(template.source, (1, 3)),
        });
        (payload, metadata)
    }

    fn payment(&mut self, template: Template, user: Option<&User>) -> (Value, Value) {
        let amount = self.money(9.99, 1999.99);
        let order_id = format!("order_{}", self.rng.random_range(100_000..=999_999));

        let payload = match template.event_type {
            "PAYMENT_SUCCESS" => {
                let fee = ((amount * 0.029 + 0.30) * 100.0).round() / 100.0;
                json!({
                    "transaction_id": format!("txn_{}", self.hex(12)),
                    "order_id": order_id,
                    "amount": amount,
                    "currency": self.pick(&["USD", "EUR", "GBP"]),
                    "payment_method": self.pick(&["credit_card", "debit_card", "apple_pay"]),
                    "card_last_four": self.rng.random_range(1000..=9999).to_string(),
                    "card_brand": self.pick(&["visa", "mastercard", "amex"]),
                    "processor": self.pick(&["stripe", "paypal", "square"]),
                    "merchant_fee": fee,
                    "net_amount": ((amount - fee) * 100.0).round() / 100.0,
                    "processing_time_ms": self.rng.random_range(500..=3000),
                })
            }
            "PAYMENT_FAILED" => json!({
                "transaction_id": format!("txn_failed_{}", self.hex(8)),
                "order_id": order_id,
                "amount": amount,
                "currency": "USD",
                "payment_method": "credit_card",
                "card_last_four": self.rng.random_range(1000..=9999).to_string(),
                "card_brand": self.pick(&["visa", "mastercard", "amex"]),
                "processor": "stripe",
                "failure_code": self.pick(&[
                    "insufficient_funds",
                    "card_declined",
                    "expired_card",
                    "cvc_check_failed",
                ]),
                "retry_attempt": self.rng.random_range(1..=3),
                "max_retries": 3,
            }),
            _ => json!({
                "refund_id": format!("ref_{}", self.hex(12)),
                "transaction_id": format!("txn_{}", self.hex(12)),
                "original_order_id": order_id,
                "refund_amount": amount,
                "refund_reason": self.pick(&[
                    "customer_request",
                    "item_not_received",
                    "item_damaged",
                    "wrong_item",
                ]),
                "refund_type": self.pick(&["full", "partial"]),
                "initiated_by": self.pick(&["customer", "customer_service", "system"]),
                "processing_time_days": self.rng.random_range(1..=7),
            }),
        };

        let metadata = json!({
            "ip_address": self.ip(),
            "country": user.map(|u| u.country),
            "processor_response_code": if template.event_type.ends_with("SUCCESS") {
                "approved"
            } else {
                "declined"
            },
            "risk_score": (self.rng.random_range(0.1..9.9_f64) * 10.0).round() / 10.0,
            "version": self.version(template.source, (1, 2)),
        });
        (payload, metadata)
    }

    fn order(
        &mut self,
        template: Template,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> (Value, Value) {
        let order_id = format!("order_{}", self.rng.random_range(100_000..=999_999));
        let item_count = self.rng.random_range(1..=3);
        let items: Vec<Value> = (0..item_count)
            .map(|_| {
                json!({
                    "product_id": format!("prod_{}", self.hex(8)),
                    "quantity": self.rng.random_range(1..=3),
                    "price": self.money(4.99, 499.99),
                    "category": self.pick(&["electronics", "books", "garden", "toys"]),
                })
            })
            .collect();

        let payload = if template.event_type == "ORDER_CREATED" {
            let total: f64 = items
                .iter()
                .map(|item| {
                    item["price"].as_f64().unwrap_or_default()
                        * item["quantity"].as_f64().unwrap_or_default()
                })
                .sum();
            json!({
                "order_id": order_id,
                "total_amount": (total * 100.0).round() / 100.0,
                "currency": "USD",
                "item_count": items.len(),
                "items": items,
                "shipping_address": {
                    "country": user.map(|u| u.country),
                    "city": user.map(|u| u.city),
                    "zip": format!("{:05}", self.rng.random_range(0..100_000)),
                },
                "shipping_method": self.pick(&["standard", "express", "overnight"]),
                "estimated_delivery": now + Duration::days(self.rng.random_range(2..=10)),
            })
        } else {
            json!({
                "order_id": order_id,
                "cancellation_reason": self.pick(&[
                    "customer_request",
                    "payment_failed",
                    "out_of_stock",
                    "address_issue",
                ]),
                "cancelled_by": self.pick(&["customer", "system", "admin"]),
                "refund_initiated": self.rng.random_bool(0.5),
                "items_to_restock": items,
            })
        };

        let metadata = json!({
            "cart_session_duration_minutes": self.rng.random_range(5..=120),
            "utm_source": self.pick(&["google", "facebook", "email", "direct"]),
            "version": self.version(template.source, (2, 4)),
        });
        (payload, metadata)
    }

    fn system(&mut self, template: Template) -> (Value, Value) {
        let payload = if template.event_type == "SYSTEM_ERROR" {
            let (error_type, error_code, message) = self.pick(&[
                (
                    "database_connection_failed",
                    "DB_CONNECTION_TIMEOUT",
                    "Connection to primary database lost",
                ),
                ("external_api_timeout", "API_TIMEOUT", "External payment API timeout"),
                ("memory_exceeded", "MEMORY_EXCEEDED", "Memory usage exceeded 90%"),
                ("disk_full", "DISK_FULL", "Disk space critically low"),
            ]);
            let affected = self.rng.random_range(1..=3);
            let endpoints: Vec<&str> = ["/api/v1/payments", "/api/v1/orders", "/api/v1/users"]
                .choose_multiple(&mut self.rng, affected)
                .copied()
                .collect();
            json!({
                "error_type": error_type,
                "error_code": error_code,
                "error_message": message,
                "affected_endpoints": endpoints,
                "estimated_affected_users": self.rng.random_range(100..=5000),
                "fallback_activated": self.rng.random_bool(0.5),
                "fallback_type": self.pick(&["read_replica", "cache", "degraded_mode"]),
            })
        } else {
            json!({
                "endpoint": self.pick(&["/api/v1/orders", "/api/v1/payments", "/api/v1/users"]),
                "method": self.pick(&["GET", "POST", "PUT"]),
                "rate_limit": self.pick(&[100, 1000, 5000]),
                "time_window": self.pick(&["1m", "1h", "1d"]),
                "current_count": self.rng.random_range(150..=2000),
                "client_ip": self.ip(),
                "client_id": format!("client_{}", self.hex(8)),
                "blocked_duration_seconds": self.pick(&[60, 300, 3600]),
            })
        };

        let metadata = json!({
            "service_instance":
                format!("{}-pod-{}", template.source, self.rng.random_range(1..=10)),
            "kubernetes_namespace": "production",
            "version": self.version(template.source, (1, 2)),
        });
        (payload, metadata)
    }

    fn notification(
        &mut self,
        template: Template,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> (Value, Value) {
        let channel = self.pick(&["email", "sms", "push"]);
        let mut payload = json!({
            "notification_id": format!("notif_{channel}_{}", self.hex(8)),
            "channel": channel,
            "template": self.pick(&[
                "payment_failure_alert",
                "order_confirmation",
                "welcome_email",
                "password_reset",
            ]),
            "recipient": self.email_or_phone(user),
            "triggered_by_event": self.uuid().to_string(),
            "provider": self.pick(&["sendgrid", "twilio", "firebase"]),
        });

        let extra = if template.event_type == "NOTIFICATION_DELIVERED" {
            json!({
                "delivery_time_ms": self.rng.random_range(1000..=5000),
                "provider_message_id": format!("msg_{}", self.hex(12)),
            })
        } else {
            json!({
                "failure_reason": self.pick(&[
                    "invalid_email",
                    "invalid_phone_number",
                    "provider_error",
                    "rate_limited",
                ]),
                "provider_error_code": self.rng.random_range(20_000..=29_999).to_string(),
                "retry_attempt": self.rng.random_range(1..=3),
                "max_retries": 3,
                "next_retry_at": now + Duration::minutes(self.rng.random_range(5..=60)),
            })
        };
        merge(&mut payload, extra);

        let metadata = json!({
            "cost_usd": (self.rng.random_range(0.001..0.05_f64) * 10_000.0).round() / 10_000.0,
            "version": self.version(template.source, (1, 2)),
        });
        (payload, metadata)
    }

    fn profile(&mut self, template: Template) -> (Value, Value) {
        let count = self.rng.random_range(1..=3);
        let fields: Vec<&str> = ["phone", "address", "preferences", "name"]
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();
        let verification: Vec<&str> = fields.iter().copied().filter(|f| *f == "phone").collect();

        let payload = json!({
            "updated_fields": fields,
            "verification_required": verification,
            "gdpr_consent_updated": self.rng.random_bool(0.5),
        });
        let metadata = json!({
            "ip_address": self.ip(),
            "version": self.version(template.source, (1, 3)),
        });
        (payload, metadata)
    }

    fn analytics(&mut self, template: Template, now: DateTime<Utc>) -> (Value, Value) {
        let payload = json!({
            "experiment_id": self.pick(&[
                "checkout_flow_v2",
                "homepage_hero",
                "pricing_page",
                "signup_form",
            ]),
            "variant": self.pick(&["control", "treatment_a", "treatment_b"]),
            "conversion_event":
                self.pick(&["purchase_completed", "signup_completed", "trial_started"]),
            "conversion_value": self.money(10.0, 500.0),
            "time_to_conversion_minutes": self.rng.random_range(1..=120),
            "user_segment": self.pick(&["new_user", "returning_customer", "premium_user"]),
        });
        let metadata = json!({
            "experiment_start_date": now - Duration::days(self.rng.random_range(1..=30)),
            "confidence_level": self.pick(&[90, 95, 99]),
            "version": self.version(template.source, (1, 2)),
        });
        (payload, metadata)
    }
}

fn random_user(rng: &mut StdRng) -> User {
    let (country, cities) = COUNTRIES[rng.random_range(0..COUNTRIES.len())];
    let city = cities[rng.random_range(0..cities.len())];
    let id = uuid::Builder::from_random_bytes(rng.random()).into_uuid();
    let short = &id.simple().to_string()[..8];

    User {
        user_id: format!("user_{short}"),
        email: format!("{short}@example.com"),
        country,
        city,
    }
}

fn object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn merge(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        target.extend(extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use validator::Validate;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_seeded_output_is_reproducible() {
        let a = EventGenerator::new(Some(42)).unwrap().generate(25, now());
        let b = EventGenerator::new(Some(42)).unwrap().generate(25, now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_events_are_valid_and_within_template_range() {
        let events = EventGenerator::new(Some(7)).unwrap().generate(300, now());

        for event in &events {
            assert!(event.validate().is_ok(), "{event:?}");
            let template = TEMPLATES
                .iter()
                .find(|t| t.event_type == event.event_type)
                .unwrap();
            assert_eq!(event.source, template.source);
            assert!((template.severity.0..=template.severity.1).contains(&event.severity));
            assert!(event.trace_id.as_ref().unwrap().starts_with("trace_"));
            assert_eq!(event.timestamp, Some(now()));
            assert!(event.payload.is_some());
        }
    }

    #[test]
    fn test_criticals_only_restricts_severity() {
        let events = EventGenerator::criticals_only(Some(3))
            .unwrap()
            .generate(200, now());

        assert!(events.iter().all(|e| (8..=10).contains(&e.severity)));
        let allowed = [
            "USER_LOGIN_FAILED",
            "PAYMENT_FAILED",
            "SYSTEM_ERROR",
            "NOTIFICATION_FAILED",
        ];
        assert!(events.iter().all(|e| allowed.contains(&e.event_type.as_str())));
    }

    #[test]
    fn test_system_errors_have_no_session() {
        let events = EventGenerator::new(Some(11)).unwrap().generate(2000, now());
        let errors: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == "SYSTEM_ERROR")
            .collect();

        assert!(!errors.is_empty());
        assert!(errors.iter().all(|e| e.user_id.is_none() && e.session_id.is_none()));
    }

    #[test]
    fn test_payment_payload_feeds_text_index() {
        let events = EventGenerator::new(Some(5)).unwrap().generate(500, now());
        let payment = events
            .iter()
            .find(|e| e.event_type == "PAYMENT_SUCCESS")
            .unwrap();
        let payload = payment.payload.as_ref().unwrap();

        for field in ["card_brand", "processor", "payment_method", "currency", "transaction_id"] {
            assert!(payload.contains_key(field), "missing {field}");
        }
        let session = payment.session_id.as_ref().unwrap();
        assert!(session.starts_with("sess_"));
        assert_eq!(session.len(), "sess_".len() + 12);
    }
}
