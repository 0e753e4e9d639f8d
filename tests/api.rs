use actix_web::{test, web, App};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use campus_ledger::{api, AppState, Settings};
use serde_json::{json, Value};

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(api::configure),
        )
        .await
    };
}

async fn seeded_state() -> AppState {
    let mut config = Settings::new_for_test().expect("Failed to load test config");
    config.database.seed = true;
    config.uploads.folder = tempfile::tempdir().unwrap().into_path();
    AppState::new(config).await.expect("Failed to create state")
}

async fn login(state: &AppState, uid: &str, password: &str) -> String {
    state
        .auth_service
        .authenticate(uid, password)
        .await
        .expect("Failed to log in")
}

#[actix_web::test]
async fn test_login() {
    let state = seeded_state().await;
    let app = init_app!(state);

    let response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "uid": "niko", "password": "123niko" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    let token = body["token"].as_str().unwrap();

    let user = state.auth_service.validate_token(token).await.unwrap();
    assert_eq!(user.uid, "niko");

    let response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "uid": "niko", "password": "wrongpassword" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["error"]["status"], 401);
}

#[actix_web::test]
async fn test_create_and_get_user() {
    let state = seeded_state().await;
    let app = init_app!(state);

    let response = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({ "name": "Ada Lovelace", "uid": "ada" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["uid"], "ada");
    assert_eq!(body["role"], "User");
    assert!(body["sections"].is_null());
    assert!(body.get("password").is_none());

    // Default password works
    login(&state, "ada", "123qwerty").await;

    let response = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({ "name": "Ada Again", "uid": "ada" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 409);

    let response = test::TestRequest::get()
        .uri("/api/users/toby")
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["role"], "Admin");
    assert_eq!(body["sections"].as_array().unwrap().len(), 2);

    let response = test::TestRequest::get()
        .uri("/api/users/nobody")
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 404);
}

#[actix_web::test]
async fn test_sign_up_cannot_claim_admin() {
    let state = seeded_state().await;
    let app = init_app!(state);

    let response = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({ "name": "Mallory", "uid": "mallory", "role": "Admin" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["role"], "User");

    let mallory = login(&state, "mallory", "123qwerty").await;
    let response = test::TestRequest::delete()
        .uri("/api/users/toby")
        .insert_header(("Authorization", format!("Bearer {}", mallory)))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 403);
    assert!(state.db.get_user_by_uid("toby").await.unwrap().is_some());
}

#[actix_web::test]
async fn test_sign_up_rejects_path_like_uid() {
    let state = seeded_state().await;
    let app = init_app!(state);

    let response = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({ "name": "Mallory", "uid": ".." }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_update_requires_owner_or_admin() {
    let state = seeded_state().await;
    let app = init_app!(state);
    let niko = login(&state, "niko", "123niko").await;
    let toby = login(&state, "toby", "123toby").await;

    let response = test::TestRequest::put()
        .uri("/api/users/hop")
        .set_json(json!({ "name": "Not Grace" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);

    let response = test::TestRequest::put()
        .uri("/api/users/hop")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(json!({ "name": "Not Grace" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 403);

    let response = test::TestRequest::put()
        .uri("/api/users/niko")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(json!({ "name": "Nikola Tesla", "kasm_server_needed": true }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["name"], "Nikola Tesla");
    assert_eq!(body["kasm_server_needed"], true);

    let response = test::TestRequest::delete()
        .uri("/api/users/hop")
        .insert_header(("Authorization", format!("Bearer {}", toby)))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 204);

    let response = test::TestRequest::get()
        .uri("/api/users/hop")
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 404);
}

#[actix_web::test]
async fn test_section_enrollment_routes() {
    let state = seeded_state().await;
    let app = init_app!(state);
    let lex = login(&state, "lex", "123lex").await;

    let response = test::TestRequest::post()
        .uri("/api/users/lex/sections")
        .insert_header(("Authorization", format!("Bearer {}", lex)))
        .set_json(json!({ "sections": ["CSA", "CSP"] }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    let abbreviations: Vec<&str> = body["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["abbreviation"].as_str().unwrap())
        .collect();
    assert_eq!(abbreviations, vec!["CSA", "CSP", "Robotics"]);

    let response = test::TestRequest::post()
        .uri("/api/users/lex/sections")
        .insert_header(("Authorization", format!("Bearer {}", lex)))
        .set_json(json!({ "sections": ["Underwater Basket Weaving"] }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 404);

    let response = test::TestRequest::delete()
        .uri("/api/users/lex/sections")
        .insert_header(("Authorization", format!("Bearer {}", lex)))
        .set_json(json!({ "sections": ["CSA", "CSSE"] }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 404);

    let response = test::TestRequest::delete()
        .uri("/api/users/lex/sections")
        .insert_header(("Authorization", format!("Bearer {}", lex)))
        .set_json(json!({ "sections": ["CSA", "Robotics"] }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);

    let response = test::TestRequest::get()
        .uri("/api/users/lex/sections")
        .send_request(&app)
        .await;
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["sections"].as_array().unwrap().len(), 1);
    assert_eq!(body["sections"][0]["abbreviation"], "CSP");
}

#[actix_web::test]
async fn test_create_section_admin_only() {
    let state = seeded_state().await;
    let app = init_app!(state);
    let niko = login(&state, "niko", "123niko").await;
    let toby = login(&state, "toby", "123toby").await;
    let section = json!({ "name": "Data Structures", "abbreviation": "DS" });

    let response = test::TestRequest::post()
        .uri("/api/sections")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(&section)
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 403);

    let response = test::TestRequest::post()
        .uri("/api/sections")
        .insert_header(("Authorization", format!("Bearer {}", toby)))
        .set_json(&section)
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 201);

    let response = test::TestRequest::get().uri("/api/sections").send_request(&app).await;
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 5);
}

#[actix_web::test]
async fn test_profile_picture_routes() {
    let state = seeded_state().await;
    let upload_folder = state.config.uploads.folder.clone();
    let app = init_app!(state);
    let fred = login(&state, "fred", "123qwerty").await;

    let response = test::TestRequest::put()
        .uri("/api/users/fred/pfp")
        .insert_header(("Authorization", format!("Bearer {}", fred)))
        .set_json(json!({ "filename": "bedrock.png", "image": BASE64.encode(b"yabba dabba") }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["pfp"], "bedrock.png");
    assert_eq!(
        std::fs::read(upload_folder.join("fred").join("bedrock.png")).unwrap(),
        b"yabba dabba"
    );

    let response = test::TestRequest::put()
        .uri("/api/users/fred/pfp")
        .insert_header(("Authorization", format!("Bearer {}", fred)))
        .set_json(json!({ "filename": "bedrock.png", "image": "%%% not base64 %%%" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);

    let response = test::TestRequest::delete()
        .uri("/api/users/fred/pfp")
        .insert_header(("Authorization", format!("Bearer {}", fred)))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    assert!(body["pfp"].is_null());
}

#[actix_web::test]
async fn test_stock_game_routes() {
    let state = seeded_state().await;
    let app = init_app!(state);
    let niko = login(&state, "niko", "123niko").await;

    let response = test::TestRequest::post()
        .uri("/api/stocks/buy")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(json!({ "uid": "niko", "symbol": "AAPL", "quantity": 1 }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);

    let response = test::TestRequest::post()
        .uri("/api/stocks/account")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(json!({ "uid": "niko" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["balance"], 100_000);

    let response = test::TestRequest::post()
        .uri("/api/stocks/buy")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(json!({ "uid": "niko", "symbol": "AAPL", "quantity": 10 }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let receipt: Value = test::read_body_json(response).await;
    assert_eq!(receipt["transaction_amount"], 1_900);
    assert_eq!(receipt["balance"], 98_100);

    let response = test::TestRequest::get()
        .uri("/api/stocks/balance/niko")
        .send_request(&app)
        .await;
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["balance"], 98_100);

    // Buying on someone else's account is refused
    let response = test::TestRequest::post()
        .uri("/api/stocks/buy")
        .insert_header(("Authorization", format!("Bearer {}", niko)))
        .set_json(json!({ "uid": "toby", "symbol": "AAPL", "quantity": 1 }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 403);

    let response = test::TestRequest::get().uri("/api/stocks").send_request(&app).await;
    let stocks: Value = test::read_body_json(response).await;
    let aapl = stocks
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["symbol"] == "AAPL")
        .unwrap();
    assert_eq!(aapl["quantity"], 9_990);
}
