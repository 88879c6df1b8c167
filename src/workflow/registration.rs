//! Registration: unregistered → name → company → pending approval

use super::effect::{Effect, Outgoing, Recipient};
use super::event::Inbound;
use super::keyboard::{self, Markup};
use super::render;
use super::token::SessionToken;
use super::transition::{Context, TransitionResult};
use super::validate;
use crate::db::{NewUser, Role, User, UserPatch};

/// First contact from an unknown user
pub fn welcome(ctx: &Context, event: &Inbound) -> TransitionResult {
    let new = NewUser {
        id: event.actor.id,
        username: event.actor.username.clone(),
        role: if ctx.allow_listed { Role::Admin } else { Role::User },
        is_approved: ctx.allow_listed,
        state: Some(SessionToken::RegName),
    };
    TransitionResult::new()
        .with_effect(Effect::CreateUser(new))
        .with_effect(Effect::reply(render::REGISTRATION_PROMPT))
}

/// `/start`, "back to menu" and `back_to_main`
pub fn start(user: &User) -> TransitionResult {
    if user.is_approved {
        let clear = user
            .state
            .as_ref()
            .map(|_| Effect::set_token(user.id, None));
        return TransitionResult::new()
            .with_effects(clear)
            .with_effect(Effect::reply_with(
                render::greeting(user),
                Markup::Dashboard(user.role),
            ));
    }

    match user.state {
        // Still typing details: start the questions over
        Some(SessionToken::RegName | SessionToken::RegCompany) => TransitionResult::new()
            .with_effect(Effect::set_token(user.id, Some(SessionToken::RegName)))
            .with_effect(Effect::reply(render::REGISTRATION_PROMPT)),
        _ => TransitionResult::new().with_effect(Effect::reply(render::ACCOUNT_PENDING)),
    }
}

/// Text typed while the token is `REG_*`
pub fn input(user: &User, text: &str) -> TransitionResult {
    let value = match validate::non_empty(text) {
        Ok(value) => value,
        Err(e) => return TransitionResult::new().with_effect(Effect::reply(e.to_string())),
    };

    match user.state {
        Some(SessionToken::RegName) => {
            let patch = UserPatch {
                full_name: Some(value),
                state: Some(Some(SessionToken::RegCompany)),
                ..UserPatch::default()
            };
            TransitionResult::new()
                .with_effect(Effect::UpdateUser {
                    id: user.id,
                    patch,
                })
                .with_effect(Effect::reply("🏢 Enter your Company Name:"))
        }
        Some(SessionToken::RegCompany) => {
            let patch = UserPatch {
                company_name: Some(value),
                state: Some(None),
                ..UserPatch::default()
            };
            let mut registered = user.clone();
            patch.apply(&mut registered);

            let result = TransitionResult::new().with_effect(Effect::UpdateUser {
                id: user.id,
                patch,
            });

            // Allow-listed users were approved on first contact
            if registered.is_approved {
                return result.with_effect(Effect::reply_with(
                    render::greeting(&registered),
                    Markup::Dashboard(registered.role),
                ));
            }

            result
                .with_effect(Effect::reply(
                    "✅ Registration Submitted!\nStaff will review your request and you will be notified here.",
                ))
                .with_effect(Effect::Send(
                    Outgoing::new(
                        Recipient::StaffChannel,
                        render::registration_notice(&registered),
                    )
                    .markup(keyboard::user_approval(registered.id)),
                ))
        }
        _ => TransitionResult::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::transition::tests::{replies, run, text_event, token_after};
    use crate::workflow::transition::Context;

    fn registering(state: SessionToken) -> User {
        let mut u = crate::workflow::transition::tests::user(5, Role::User, Some(state));
        u.is_approved = false;
        u.full_name = None;
        u.company_name = None;
        u
    }

    #[test]
    fn test_first_contact_creates_reg_name_profile() {
        let ctx = Context::new(None);
        let result = run(&ctx, &text_event(5, "hello")).unwrap();
        let Effect::CreateUser(new) = &result.effects[0] else {
            panic!("expected profile creation");
        };
        assert_eq!(new.state, Some(SessionToken::RegName));
        assert_eq!(new.role, Role::User);
        assert!(!new.is_approved);
        assert!(replies(&result)[0].contains("Please enter your Full Name"));
    }

    #[test]
    fn test_allow_listed_first_contact_is_admin() {
        let ctx = Context {
            allow_listed: true,
            ..Context::new(None)
        };
        let result = run(&ctx, &text_event(5, "hi")).unwrap();
        let Effect::CreateUser(new) = &result.effects[0] else {
            panic!("expected profile creation");
        };
        assert_eq!(new.role, Role::Admin);
        assert!(new.is_approved);
        assert_eq!(new.state, Some(SessionToken::RegName));
    }

    #[test]
    fn test_name_then_company_notifies_staff() {
        let ctx = Context::new(Some(registering(SessionToken::RegName)));
        let result = run(&ctx, &text_event(5, "Abebe Kebede")).unwrap();
        assert_eq!(token_after(&result, 5), Some(Some(SessionToken::RegCompany)));

        let mut u = registering(SessionToken::RegCompany);
        u.full_name = Some("Abebe Kebede".to_string());
        let ctx = Context::new(Some(u));
        let result = run(&ctx, &text_event(5, "Acme Freight")).unwrap();
        assert_eq!(token_after(&result, 5), Some(None));

        let staff_notice = result.effects.iter().find_map(|e| match e {
            Effect::Send(out) if out.to == Recipient::StaffChannel => Some(out),
            _ => None,
        });
        let notice = staff_notice.expect("staff channel notice");
        assert!(notice.text.contains("Name: Abebe Kebede"));
        assert!(notice.text.contains("Company: Acme Freight"));
        assert!(notice.markup.is_some());
    }

    #[test]
    fn test_empty_name_reprompts() {
        let ctx = Context::new(Some(registering(SessionToken::RegName)));
        let result = run(&ctx, &text_event(5, "   ")).unwrap();
        assert_eq!(token_after(&result, 5), None);
        assert_eq!(result.effects.len(), 1);
    }

    #[test]
    fn test_start_for_pending_user() {
        let mut u = registering(SessionToken::RegName);
        u.state = None;
        let result = start(&u);
        assert_eq!(replies(&result), vec![render::ACCOUNT_PENDING]);
    }
}
