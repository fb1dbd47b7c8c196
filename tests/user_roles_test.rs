mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use rstest::rstest;

use common::{at, drain, services, services_with_events, t0};
use erp_core::{
    errors::ServiceError,
    models::{Role, User},
    validation::{codes, Validatable, ValidationContext},
    ErpServices,
};

async fn user_and_role(svc: &ErpServices) -> (User, Role) {
    let user = svc
        .users
        .create_user(User::new("j.doe", "j.doe@example.com"), &at(0))
        .await
        .unwrap();
    let role = svc.users.create_role(Role::new("PLANNER"), &at(0)).await.unwrap();
    (user, role)
}

#[rstest]
#[case("ab", codes::MIN_LENGTH)]
#[case("has space", codes::INVALID_FORMAT)]
#[case("", codes::REQUIRED)]
fn bad_usernames(#[case] username: &str, #[case] rule: &str) {
    let user = User::new(username, "someone@example.com");
    let violations = user.validate_with(&ValidationContext::default());
    assert!(violations.for_field("username").any(|v| v.rule == rule), "{violations}");
}

#[tokio::test]
async fn usernames_and_emails_are_unique() {
    let svc = services();
    user_and_role(&svc).await;

    assert_matches!(
        svc.users
            .create_user(User::new("J.Doe", "other@example.com"), &at(1))
            .await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        svc.users
            .create_user(User::new("jane", "J.DOE@example.com"), &at(1))
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn assignment_is_stamped_and_effective() {
    let svc = services();
    let (user, role) = user_and_role(&svc).await;

    let assignment = svc
        .users
        .assign_role(user.id, role.id, None, &at(5))
        .await
        .unwrap();
    assert_eq!(assignment.assigned_date, at(5).now);
    assert_eq!(assignment.assigned_by_user_id, Some(common::operator()));

    let roles = svc.users.effective_roles(user.id, at(6).now).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "PLANNER");

    assert_matches!(
        svc.users.assign_role(user.id, role.id, None, &at(7)).await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn expired_assignment_can_be_granted_again() {
    let svc = services();
    let (user, role) = user_and_role(&svc).await;

    let expiry = t0() + Duration::hours(1);
    svc.users
        .assign_role(user.id, role.id, Some(expiry), &at(5))
        .await
        .unwrap();
    assert!(svc
        .users
        .effective_roles(user.id, expiry)
        .await
        .unwrap()
        .is_empty());

    let renewed = svc
        .users
        .assign_role(user.id, role.id, None, &at(120))
        .await
        .unwrap();
    assert_eq!(renewed.expires_at, None);
    assert_eq!(
        svc.users.effective_roles(user.id, at(121).now).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn expiry_must_follow_assignment() {
    let svc = services();
    let (user, role) = user_and_role(&svc).await;

    let err = svc
        .users
        .assign_role(user.id, role.id, Some(at(1).now), &at(5))
        .await
        .unwrap_err();
    assert!(err.violations().is_some());
}

#[tokio::test]
async fn held_roles_cannot_be_deleted_until_revoked() {
    let svc = services();
    let (user, role) = user_and_role(&svc).await;
    svc.users.assign_role(user.id, role.id, None, &at(1)).await.unwrap();

    assert_matches!(
        svc.users.delete_role(role.id, &at(2)).await,
        Err(ServiceError::Conflict(_))
    );

    svc.users.revoke_role(user.id, role.id, &at(3)).await.unwrap();
    assert_matches!(
        svc.users.revoke_role(user.id, role.id, &at(4)).await,
        Err(ServiceError::NotFound(_))
    );
    svc.users.delete_role(role.id, &at(5)).await.unwrap();
}

#[tokio::test]
async fn deleting_a_user_revokes_their_roles() {
    let svc = services();
    let (user, role) = user_and_role(&svc).await;
    svc.users.assign_role(user.id, role.id, None, &at(1)).await.unwrap();

    svc.users.delete_user(user.id, &at(2)).await.unwrap();

    assert_matches!(svc.users.get_user(user.id).await, Err(ServiceError::NotFound(_)));
    assert!(svc
        .users
        .effective_roles(user.id, at(3).now)
        .await
        .unwrap()
        .is_empty());
    svc.users.delete_role(role.id, &at(4)).await.unwrap();
}

#[tokio::test]
async fn inactive_roles_are_not_granted() {
    let svc = services();
    let (user, mut role) = user_and_role(&svc).await;
    role.is_active = false;
    svc.users.update_role(role.clone(), &at(1)).await.unwrap();

    assert_matches!(
        svc.users.assign_role(user.id, role.id, None, &at(2)).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn deletions_publish_their_own_events() {
    let (svc, mut rx) = services_with_events();
    let (user, role) = user_and_role(&svc).await;
    svc.users.assign_role(user.id, role.id, None, &at(1)).await.unwrap();
    drain(&mut rx);

    svc.users.delete_user(user.id, &at(2)).await.unwrap();
    svc.users.delete_role(role.id, &at(3)).await.unwrap();

    assert_eq!(drain(&mut rx), vec!["role.revoked", "user.deleted", "role.deleted"]);
}
