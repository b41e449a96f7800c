use resilient_http::{ApiClient, Call, ClientConfig, Field, Shape};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?
        .with_header("x-client", "resilient-http-demo")
        .on_error(|err| eprintln!("request failed: {err}"));
    let client = ApiClient::new(config)?;

    let listings = client
        .execute(
            Call::get("/listings")
                .query("city", "Lisbon")
                .query_opt("max_price", std::env::var("MAX_PRICE").ok())
                .expect(Shape::array(Shape::object([
                    Field::required("id", Shape::Integer),
                    Field::required("title", Shape::String),
                    Field::optional("price", Shape::nullable(Shape::Number)),
                ]))),
        )
        .await?;

    for listing in listings.as_array().into_iter().flatten() {
        println!("{listing}");
    }

    Ok(())
}
