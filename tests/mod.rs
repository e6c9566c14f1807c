use std::net::Ipv4Addr;
use std::sync::Arc;

use gatehouse_client::types::graphql::{ErrorType, Request};
use gatehouse_client::types::{unix_now, ApiKey, Email, DAY};
use gatehouse_client::{Auth, Client, ServiceError, TodoInput, Url};
use gatehouse_server::identity::Outbox;
use gatehouse_server::{App, Builder};

use async_std::net::TcpListener;
use async_std::task::{block_on, spawn, spawn_blocking};
use futures::StreamExt;

const PASSWORD: &str = "Correct-Horse-1";

async fn serve(configure: impl FnOnce(Builder) -> Builder) -> (Arc<App>, Url, Arc<Outbox>) {
    let lis = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let url: Url = format!("http://{}/", lis.local_addr().unwrap())
        .parse()
        .unwrap();
    let outbox = Arc::new(Outbox::default());
    let app = Arc::new(
        configure(App::builder(url.clone()).delivery(outbox.clone()))
            .build()
            .await
            .unwrap(),
    );

    let srv = app.clone();
    _ = spawn(async move {
        lis.incoming()
            .for_each_concurrent(None, |stream| {
                let app = srv.clone();
                async move {
                    if let Ok(stream) = stream {
                        _ = app.handle(stream).await;
                    }
                }
            })
            .await
    });
    (app, url, outbox)
}

fn service_error(e: &anyhow::Error) -> &str {
    e.downcast_ref::<ServiceError>()
        .map(|e| e.kind.as_str())
        .unwrap_or("")
}

#[async_std::test]
async fn todos() {
    let (app, url, outbox) = serve(|b| b).await;
    let outputs = app.outputs().clone();
    assert_eq!(outputs.graphql_url, url.join("graphql").unwrap());

    spawn_blocking(move || {
        let cl = Client::builder(url).build();
        let identity = cl.identity(&outputs.user_pool_client_id);
        let email: Email = "alice@example.com".parse().unwrap();

        let signed_up = identity.sign_up(&email, PASSWORD, None).unwrap();
        assert!(!signed_up.user_confirmed);
        assert_eq!(
            service_error(&identity.sign_up(&email, PASSWORD, None).unwrap_err()),
            "UsernameExistsException"
        );
        assert_eq!(
            service_error(&identity.sign_in(&email, PASSWORD).unwrap_err()),
            "UserNotConfirmedException"
        );
        assert_eq!(
            service_error(&identity.confirm_sign_up(&email, "not-a-code").unwrap_err()),
            "CodeMismatchException"
        );
        let code = block_on(outbox.last_code(&email)).unwrap();
        identity.confirm_sign_up(&email, &code).unwrap();
        let tokens = identity.sign_in(&email, PASSWORD).unwrap();
        assert_eq!(tokens.token_type, "Bearer");

        let user = Auth::Token(tokens.id_token);
        let todos = cl.todos(&user);

        // A fresh item comes back with a new id and the fields written.
        let milk = todos
            .add(&TodoInput {
                name: Some("milk".into()),
                description: Some("oat".into()),
                completed: Some(false),
            })
            .unwrap();
        assert!(!milk.id.as_str().is_empty());
        assert_eq!(milk.name.as_deref(), Some("milk"));
        let eggs = todos
            .add(&TodoInput {
                name: Some("eggs".into()),
                ..Default::default()
            })
            .unwrap();
        assert_ne!(milk.id, eggs.id);
        assert_eq!(eggs.description, None);

        assert_eq!(todos.get(&milk.id).unwrap(), Some(milk.clone()));

        let listed = todos.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&milk));
        assert!(listed.contains(&eggs));

        // Updates replace the whole item.
        let bought = todos
            .update(
                &milk.id,
                &TodoInput {
                    name: Some("milk".into()),
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(bought.completed, Some(true));
        assert_eq!(bought.description, None);
        assert_eq!(todos.get(&milk.id).unwrap(), Some(bought.clone()));

        // Updating an unknown id creates it.
        let bread_id = "bread".parse().unwrap();
        assert_eq!(todos.get(&bread_id).unwrap(), None);
        let bread = todos
            .update(
                &bread_id,
                &TodoInput {
                    name: Some("bread".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(bread.id, bread_id);
        assert_eq!(todos.get(&bread_id).unwrap(), Some(bread));

        assert_eq!(todos.delete(&milk.id).unwrap(), Some(bought));
        assert_eq!(todos.get(&milk.id).unwrap(), None);
        assert_eq!(todos.delete(&milk.id).unwrap(), None);
        assert_eq!(todos.list().unwrap().len(), 2);

        // The API key grants the same access.
        let key = Auth::ApiKey(outputs.api_key.clone());
        assert_eq!(cl.todos(&key).list().unwrap().len(), 2);
        assert_eq!(cl.outputs(&key).unwrap(), outputs);

        // Validation failures never reach the table.
        let res = cl
            .graphql(
                &key,
                &Request::new(r#"mutation { addTodo(input: { description: "no name" }) { id } }"#),
            )
            .unwrap();
        assert_eq!(res.data, None);
        assert_eq!(res.errors[0].error_type, Some(ErrorType::ValidationError));
        assert_eq!(cl.todos(&key).list().unwrap().len(), 2);

        // Anyone else is turned away.
        for auth in [
            Auth::None,
            Auth::ApiKey("da2-bogus".into()),
            Auth::Token("not.a.token".into()),
        ] {
            let todos = cl.todos(&auth);
            assert!(todos.list().is_err());
            assert!(todos.get(&eggs.id).is_err());
            assert!(todos.add(&TodoInput::default()).is_err());
            assert!(todos.update(&eggs.id, &TodoInput::default()).is_err());
            assert!(todos.delete(&eggs.id).is_err());

            let res = cl.graphql(&auth, &Request::new("{ listTodos { id } }")).unwrap();
            assert_eq!(res.data, None);
            assert_eq!(
                res.errors[0].error_type,
                Some(ErrorType::UnauthorizedException)
            );
            assert!(cl.outputs(&auth).is_err());
        }
        assert_eq!(cl.todos(&key).list().unwrap().len(), 2);
    })
    .await;

    app.destroy().await.unwrap();
    assert!(app.table().scan().await.unwrap().is_empty());
}

#[async_std::test]
async fn password_recovery() {
    let (app, url, outbox) = serve(|b| b).await;
    let client_id = app.outputs().user_pool_client_id.clone();

    spawn_blocking(move || {
        let cl = Client::builder(url).build();
        let identity = cl.identity(&client_id);
        let email: Email = "bob@example.com".parse().unwrap();

        _ = identity.sign_up(&email, PASSWORD, None).unwrap();
        let first = block_on(outbox.last_code(&email)).unwrap();
        _ = identity.resend_code(&email).unwrap();
        let code = block_on(outbox.last_code(&email)).unwrap();
        if first != code {
            assert!(identity.confirm_sign_up(&email, &first).is_err());
        }
        identity.confirm_sign_up(&email, &code).unwrap();
        assert!(block_on(app.identity().groups_for_user(&email))
            .unwrap()
            .is_empty());

        _ = identity.forgot_password(&email).unwrap();
        let code = block_on(outbox.last_code(&email)).unwrap();
        identity
            .confirm_forgot_password(&email, &code, "Battery-Staple-2")
            .unwrap();
        assert_eq!(
            service_error(&identity.sign_in(&email, PASSWORD).unwrap_err()),
            "NotAuthorizedException"
        );
        _ = identity.sign_in(&email, "Battery-Staple-2").unwrap();

        let stranger = "b0gus".parse().unwrap();
        assert_eq!(
            service_error(&cl.identity(&stranger).sign_in(&email, "Battery-Staple-2").unwrap_err()),
            "ResourceNotFoundException"
        );
    })
    .await;
}

#[async_std::test]
async fn expired_api_key() {
    let issued = unix_now() - ApiKey::VALIDITY - DAY;
    let (app, url, _) = serve(|b| b.api_key(ApiKey::provision(issued))).await;
    let outputs = app.outputs().clone();

    spawn_blocking(move || {
        let cl = Client::builder(url).build();
        let key = Auth::ApiKey(outputs.api_key);
        assert!(cl.todos(&key).list().is_err());
        let res = cl.graphql(&key, &Request::new("{ listTodos { id } }")).unwrap();
        assert_eq!(
            res.errors[0].error_type,
            Some(ErrorType::UnauthorizedException)
        );
    })
    .await;
}

#[async_std::test]
async fn store_survives_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");

    let (first, url, _) = serve(|b| b.store(&path)).await;
    let outputs = first.outputs().clone();
    let added = spawn_blocking(move || {
        let cl = Client::builder(url).build();
        cl.todos(&Auth::ApiKey(outputs.api_key))
            .add(&TodoInput {
                name: Some("milk".into()),
                ..Default::default()
            })
            .unwrap()
    })
    .await;

    let (second, url, _) = serve(|b| b.store(&path)).await;
    assert_eq!(second.outputs().user_pool_id, first.outputs().user_pool_id);
    assert_eq!(second.outputs().api_key, first.outputs().api_key);
    let outputs = second.outputs().clone();
    let id = added.id.clone();
    let found = spawn_blocking(move || {
        let cl = Client::builder(url).build();
        cl.todos(&Auth::ApiKey(outputs.api_key)).get(&id).unwrap()
    })
    .await;
    assert_eq!(found, Some(added));

    let nowhere = dir.path().join("nowhere");
    assert!(gatehouse_server::destroy(&nowhere).await.is_err());
    assert!(!nowhere.exists());

    gatehouse_server::destroy(&path).await.unwrap();
    let (third, _, _) = serve(|b| b.store(&path)).await;
    assert!(third.table().scan().await.unwrap().is_empty());
    assert_ne!(third.outputs().api_key, first.outputs().api_key);
}
