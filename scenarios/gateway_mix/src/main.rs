use http_gale_runner::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

type Ctx = VuContext<HttpRunnerContext, HttpVuContext>;

const SCENARIO_DURATION: Duration = Duration::from_secs(40);

fn get_products(ctx: &mut Ctx) -> HookResult {
    send(ctx, HttpRequest::get("/api/products"))?;
    Ok(())
}

fn get_product_by_id(ctx: &mut Ctx) -> HookResult {
    let id = random_id(1..=5);
    send(
        ctx,
        HttpRequest::get(format!("/api/products/{id}")).with_name("/api/products/{id}"),
    )?;
    Ok(())
}

fn get_products_full(ctx: &mut Ctx) -> HookResult {
    send(ctx, HttpRequest::get("/api/products-full"))?;
    Ok(())
}

fn get_inventory_by_product(ctx: &mut Ctx) -> HookResult {
    let id = random_id(1..=5);
    send(
        ctx,
        HttpRequest::get(format!("/api/inventory/product/{id}"))
            .with_name("/api/inventory/product/{id}"),
    )?;
    Ok(())
}

fn constant(name: &str, vus: usize, exec: &str) -> ScenarioSpec {
    ScenarioSpec::constant(name, vus, SCENARIO_DURATION)
        .with_exec(exec)
        .with_think_time(Duration::from_secs(1))
}

fn main() -> GaleResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_target_host("http://localhost:8000")
    .with_default_scenario(constant("products", 20, "getProducts"))
    .with_default_scenario(constant("productById", 15, "getProductById"))
    .with_default_scenario(constant("productsFull", 10, "getProductsFull"))
    .with_default_scenario(constant("inventoryByProduct", 15, "getInventoryByProduct"))
    .use_setup(configure_http_client)
    .use_named_vu_behaviour("getProducts", get_products)
    .use_named_vu_behaviour("getProductById", get_product_by_id)
    .use_named_vu_behaviour("getProductsFull", get_products_full)
    .use_named_vu_behaviour("getInventoryByProduct", get_inventory_by_product);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}
