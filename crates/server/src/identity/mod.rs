// SPDX-FileCopyrightText: 2022 Profian Inc. <opensource@profian.com>
// SPDX-License-Identifier: Apache-2.0

//! The identity store: user accounts, verification, recovery and token issuance.

mod deliver;
mod error;
mod password;
mod routes;

pub use deliver::*;
pub use error::*;
pub use password::{Hash as PasswordHash, Password};
pub use routes::*;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use gatehouse_type::identity::{
    CodeDelivery, ConfirmForgotPasswordRequest, ConfirmSignUpRequest, SignInRequest,
    SignUpRequest, SignUpResponse, UserRequest,
};
use gatehouse_type::{
    unix_now, Claims, ClientId, Email, GroupName, PhoneNumber, PoolId, TokenUse, Tokens,
    UserStatus, DAY, HOUR,
};

use async_std::sync::RwLock;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifetime of issued tokens in seconds.
pub const TOKEN_VALIDITY: u64 = HOUR;

const VERIFICATION_CODE_VALIDITY: u64 = DAY;
const RECOVERY_CODE_VALIDITY: u64 = HOUR;

/// Wrong guesses after which a pending code is discarded.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug)]
struct PendingCode {
    code: String,
    purpose: Purpose,
    expires: u64,
    failures: u32,
}

#[derive(Debug)]
struct User {
    sub: String,
    email: Email,
    phone: Option<PhoneNumber>,
    password: PasswordHash,
    status: UserStatus,
    code: Option<PendingCode>,
    groups: BTreeSet<GroupName>,
}

impl User {
    fn take_code(&mut self, purpose: Purpose, code: &str, now: u64) -> Result<(), Error> {
        let pending = self
            .code
            .as_mut()
            .filter(|p| p.purpose == purpose)
            .ok_or(Error::CodeMismatch)?;
        if !bool::from(pending.code.as_bytes().ct_eq(code.as_bytes())) {
            pending.failures += 1;
            if pending.failures >= MAX_CODE_ATTEMPTS {
                self.code = None;
                return Err(Error::LimitExceeded);
            }
            return Err(Error::CodeMismatch);
        }
        if now >= pending.expires {
            return Err(Error::ExpiredCode);
        }
        self.code = None;
        Ok(())
    }

    /// Replaces any pending code with a fresh one and returns it.
    fn issue_code(&mut self, purpose: Purpose, expires: u64) -> String {
        let code = random_code();
        self.code = Some(PendingCode {
            code: code.clone(),
            purpose,
            expires,
            failures: 0,
        });
        code
    }
}

fn random_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// A user pool with a single registered client.
pub struct Pool {
    id: PoolId,
    client: ClientId,
    issuer: String,
    groups: BTreeSet<GroupName>,
    users: RwLock<HashMap<Email, User>>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    delivery: Arc<dyn Deliver>,
    clock: fn() -> u64,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("client", &self.client)
            .field("issuer", &self.issuer)
            .field("groups", &self.groups)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Constructs a pool signing tokens with `secret` and declaring the
    /// [`GroupName::ADMIN`] group.
    pub fn new(id: PoolId, client: ClientId, secret: &[u8], delivery: Arc<dyn Deliver>) -> Self {
        let issuer = format!("urn:gatehouse:{}:{id}", id.region());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        Self {
            id,
            client,
            issuer,
            groups: [GroupName::admin()].into(),
            users: Default::default(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            delivery,
            clock: unix_now,
        }
    }

    /// Replaces the clock used for code expiry and token issuance.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> &PoolId {
        &self.id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn check_client(&self, client: &ClientId) -> Result<(), Error> {
        if client == &self.client {
            Ok(())
        } else {
            debug!(target: "app::identity", "unknown client `{client}`");
            Err(Error::ResourceNotFound)
        }
    }

    /// Delivers a code issued to `email`. The users lock must not be held.
    /// On failure the code is withdrawn unless a newer one replaced it.
    async fn send_code(
        &self,
        email: &Email,
        destination: Destination,
        purpose: Purpose,
        code: String,
    ) -> Result<CodeDelivery, Error> {
        let delivery = destination.delivery();
        let sent = self
            .delivery
            .deliver(Message {
                email: email.clone(),
                destination,
                purpose,
                code: code.clone(),
            })
            .await;
        if let Err(e) = sent {
            warn!(target: "app::identity", "failed to deliver {purpose:?} code: {e:#}");
            let mut users = self.users.write().await;
            if let Some(user) = users.get_mut(email) {
                if user.code.as_ref().map_or(false, |p| p.code == code) {
                    user.code = None;
                }
            }
            return Err(Error::Internal(e));
        }
        Ok(delivery)
    }

    /// Registers a new, unconfirmed user and sends a verification code to
    /// their email.
    pub async fn sign_up(
        &self,
        SignUpRequest {
            client_id,
            email,
            password,
            phone_number,
        }: SignUpRequest,
    ) -> Result<SignUpResponse, Error> {
        self.check_client(&client_id)?;
        let password = PasswordHash::new(&Password::new(password)?);

        let user_sub = Uuid::new_v4().to_string();
        let expires = (self.clock)().saturating_add(VERIFICATION_CODE_VALIDITY);
        let code = {
            let mut users = self.users.write().await;
            if users.contains_key(&email) {
                return Err(Error::UsernameExists);
            }
            let mut user = User {
                sub: user_sub.clone(),
                email: email.clone(),
                phone: phone_number,
                password,
                status: UserStatus::Unconfirmed,
                code: None,
                groups: Default::default(),
            };
            let code = user.issue_code(Purpose::Verification, expires);
            _ = users.insert(email.clone(), user);
            code
        };

        let code_delivery = match self
            .send_code(
                &email,
                Destination::Email(email.clone()),
                Purpose::Verification,
                code,
            )
            .await
        {
            Ok(delivery) => delivery,
            Err(e) => {
                let mut users = self.users.write().await;
                if users.get(&email).map_or(false, |user| {
                    user.sub == user_sub && user.status == UserStatus::Unconfirmed
                }) {
                    _ = users.remove(&email);
                }
                return Err(e);
            }
        };
        info!(target: "app::identity", sub = %user_sub, "user signed up");
        Ok(SignUpResponse {
            user_sub,
            user_confirmed: false,
            code_delivery,
        })
    }

    /// Confirms a user's email with the code sent on sign-up.
    pub async fn confirm_sign_up(
        &self,
        ConfirmSignUpRequest {
            client_id,
            email,
            code,
        }: ConfirmSignUpRequest,
    ) -> Result<(), Error> {
        self.check_client(&client_id)?;
        let mut users = self.users.write().await;
        let user = users.get_mut(&email).ok_or(Error::UserNotFound)?;
        if user.status == UserStatus::Confirmed {
            return Err(Error::InvalidParameter(
                "User cannot be confirmed. Current status is CONFIRMED".into(),
            ));
        }
        user.take_code(Purpose::Verification, &code, (self.clock)())?;
        user.status = UserStatus::Confirmed;
        info!(target: "app::identity", sub = %user.sub, "user confirmed");
        Ok(())
    }

    /// Sends a fresh verification code to an unconfirmed user.
    pub async fn resend_confirmation_code(
        &self,
        UserRequest { client_id, email }: UserRequest,
    ) -> Result<CodeDelivery, Error> {
        self.check_client(&client_id)?;
        let expires = (self.clock)().saturating_add(VERIFICATION_CODE_VALIDITY);
        let code = {
            let mut users = self.users.write().await;
            let user = users.get_mut(&email).ok_or(Error::UserNotFound)?;
            if user.status == UserStatus::Confirmed {
                return Err(Error::InvalidParameter("User is already confirmed".into()));
            }
            user.issue_code(Purpose::Verification, expires)
        };
        self.send_code(
            &email,
            Destination::Email(email.clone()),
            Purpose::Verification,
            code,
        )
        .await
    }

    /// Exchanges credentials for tokens.
    pub async fn sign_in(
        &self,
        SignInRequest {
            client_id,
            email,
            password,
        }: SignInRequest,
    ) -> Result<Tokens, Error> {
        self.check_client(&client_id)?;
        let hash = self
            .users
            .read()
            .await
            .get(&email)
            .map(|user| user.password.clone())
            .ok_or(Error::NotAuthorized)?;
        if !hash.verify(&password) {
            return Err(Error::NotAuthorized);
        }

        let users = self.users.read().await;
        let user = users.get(&email).ok_or(Error::NotAuthorized)?;
        if user.status != UserStatus::Confirmed {
            return Err(Error::UserNotConfirmed);
        }

        let now = (self.clock)();
        let claims = |token_use| Claims {
            sub: user.sub.clone(),
            email: user.email.clone(),
            groups: user.groups.iter().cloned().collect(),
            client_id: self.client.clone(),
            token_use,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + TOKEN_VALIDITY,
        };
        let sign = |claims: &Claims| {
            encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
                .map_err(|e| Error::Internal(anyhow::Error::new(e).context("failed to sign token")))
        };
        let tokens = Tokens {
            id_token: sign(&claims(TokenUse::Id))?,
            access_token: sign(&claims(TokenUse::Access))?,
            expires_in: TOKEN_VALIDITY,
            token_type: "Bearer".into(),
        };
        info!(target: "app::identity", sub = %user.sub, "user signed in");
        Ok(tokens)
    }

    /// Starts account recovery, sending a code to the user's phone if they
    /// registered one and to their email otherwise.
    pub async fn forgot_password(
        &self,
        UserRequest { client_id, email }: UserRequest,
    ) -> Result<CodeDelivery, Error> {
        self.check_client(&client_id)?;
        let expires = (self.clock)().saturating_add(RECOVERY_CODE_VALIDITY);
        let (destination, code) = {
            let mut users = self.users.write().await;
            let user = users.get_mut(&email).ok_or(Error::UserNotFound)?;
            if user.status != UserStatus::Confirmed {
                return Err(Error::InvalidParameter(
                    "Cannot reset password for the user as there is no registered/verified email or phone_number".into(),
                ));
            }
            let destination = match &user.phone {
                Some(phone) => Destination::Sms(phone.clone()),
                None => Destination::Email(email.clone()),
            };
            (destination, user.issue_code(Purpose::Recovery, expires))
        };
        self.send_code(&email, destination, Purpose::Recovery, code)
            .await
    }

    /// Completes account recovery, setting a new password.
    pub async fn confirm_forgot_password(
        &self,
        ConfirmForgotPasswordRequest {
            client_id,
            email,
            code,
            password,
        }: ConfirmForgotPasswordRequest,
    ) -> Result<(), Error> {
        self.check_client(&client_id)?;
        let password = PasswordHash::new(&Password::new(password)?);
        let mut users = self.users.write().await;
        let user = users.get_mut(&email).ok_or(Error::UserNotFound)?;
        user.take_code(Purpose::Recovery, &code, (self.clock)())?;
        user.password = password;
        info!(target: "app::identity", sub = %user.sub, "password reset");
        Ok(())
    }

    /// Validates a token issued by this pool and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(target: "app::identity", "token rejected: {e}");
                Error::NotAuthorized
            })?
            .claims;
        if claims.client_id != self.client {
            debug!(target: "app::identity", "token issued to unknown client `{}`", claims.client_id);
            return Err(Error::NotAuthorized);
        }
        Ok(claims)
    }

    /// Adds a user to one of the declared groups.
    pub async fn add_user_to_group(&self, email: &Email, group: &GroupName) -> Result<(), Error> {
        if !self.groups.contains(group) {
            return Err(Error::GroupNotFound);
        }
        let mut users = self.users.write().await;
        let user = users.get_mut(email).ok_or(Error::UserNotFound)?;
        _ = user.groups.insert(group.clone());
        Ok(())
    }

    /// Returns the groups a user belongs to.
    pub async fn groups_for_user(&self, email: &Email) -> Result<Vec<GroupName>, Error> {
        self.users
            .read()
            .await
            .get(email)
            .map(|user| user.groups.iter().cloned().collect())
            .ok_or(Error::UserNotFound)
    }
}
