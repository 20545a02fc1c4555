//! Home page verification for the Ksero site.
//!
//! Run against a local dev server:
//!
//! ```text
//! cargo run -p home_page -- --config suites/home_page/crosswind.toml
//! ```

use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use crosswind_runner::prelude::*;

fn open_home(ctx: &mut CaseContext) -> StepResult {
    ctx.goto("/")
}

fn check_hero_title(ctx: &mut CaseContext) -> StepResult {
    ctx.assert_text_visible("Cocinamos tu")?;
    ctx.assert_text_visible("tranquilidad")?;
    ctx.assert_class_contains(&Target::text("tranquilidad"), "text-green-600")?;
    Ok(())
}

fn check_plans_button(ctx: &mut CaseContext) -> StepResult {
    let button = Target::link("Ver Planes");
    ctx.assert_visible(&button)?;
    ctx.assert_enabled(&button)?;
    // The green-600 background, resolved to its RGB components.
    ctx.assert_style_contains(&button, "background-color", "22, 163, 74")?;
    Ok(())
}

fn check_menu_button(ctx: &mut CaseContext) -> StepResult {
    let button = Target::link("Ver Menú");
    ctx.assert_visible(&button)?;
    ctx.assert_enabled(&button)?;
    Ok(())
}

fn check_benefits_section(ctx: &mut CaseContext) -> StepResult {
    let heading = Target::text("¿Por qué elegir Ksero?");
    ctx.scroll_into_view(&heading)?;
    ctx.assert_visible(&heading)?;

    for benefit in [
        "Comida Saludable",
        "Ahorra Tiempo",
        "Variedad de Menús",
        "Entrega a Domicilio",
    ] {
        ctx.assert_visible(&Target::exact_text(benefit))?;
    }
    // One iconed card per benefit.
    ctx.assert_count(".relative:has(svg)", 4)?;
    Ok(())
}

fn check_hero_image(ctx: &mut CaseContext) -> StepResult {
    let image = Target::css(r#"img[alt*="Ksero"]"#);
    ctx.assert_visible(&image)?;
    ctx.assert_image_loaded(&image)?;
    Ok(())
}

fn check_load_time(ctx: &mut CaseContext) -> StepResult {
    ctx.assert_loaded_within(3_000)?;
    if let Some(took) = ctx.last_navigation_ms() {
        ctx.log(&format!("home page loaded in {took}ms"));
    }
    Ok(())
}

fn check_desktop_layout(ctx: &mut CaseContext) -> StepResult {
    ctx.set_viewport(1920, 1080)?;
    ctx.assert_text_visible("Cocinamos tu")
}

fn check_tablet_layout(ctx: &mut CaseContext) -> StepResult {
    ctx.set_viewport(768, 1024)?;
    ctx.assert_text_visible("Cocinamos tu")
}

fn check_mobile_layout(ctx: &mut CaseContext) -> StepResult {
    ctx.set_viewport(375, 667)?;
    ctx.assert_text_visible("Cocinamos tu")
}

/// Hover styling differs between themes, so the colours are recorded in the
/// trace rather than asserted.
fn observe_plans_button_hover(ctx: &mut CaseContext) -> StepResult {
    let button = Target::link("Ver Planes");
    let resting = ctx.computed_style(&button, "background-color")?;
    ctx.hover(&button)?;
    ctx.pause(Duration::from_millis(500))?;
    let hovered = ctx.computed_style(&button, "background-color")?;
    ctx.log(&format!(
        "plans button background: resting {resting}, hovered {hovered}"
    ));
    Ok(())
}

fn block_image_requests(ctx: &mut CaseContext) -> StepResult {
    ctx.block_requests(&["**/*.jpg", "**/*.png"])?;
    ctx.goto("/")
}

fn check_content_without_images(ctx: &mut CaseContext) -> StepResult {
    ctx.assert_text_visible("Cocinamos tu")
}

fn check_minimum_resolution(ctx: &mut CaseContext) -> StepResult {
    ctx.set_viewport(320, 568)?;
    ctx.assert_text_visible("Cocinamos tu")?;
    ctx.assert_visible(&Target::link("Ver Planes"))?;
    Ok(())
}

fn check_image_alt_text(ctx: &mut CaseContext) -> StepResult {
    let alts = ctx.collect_attributes("img", "alt")?;
    let missing = alts.iter().filter(|alt| alt.trim().is_empty()).count();
    ctx.expect(
        "every image has alt text",
        "0 images without alt",
        &format!("{missing} of {} images without alt", alts.len()),
        missing == 0,
    )
}

fn check_link_text(ctx: &mut CaseContext) -> StepResult {
    let texts = ctx.collect_texts("a")?;
    let empty = texts.iter().filter(|text| text.is_empty()).count();
    ctx.expect(
        "every link has descriptive text",
        "0 links without text",
        &format!("{empty} of {} links without text", texts.len()),
        empty == 0,
    )
}

fn check_acceptance_title(ctx: &mut CaseContext) -> StepResult {
    ctx.assert_text_visible("Cocinamos tu")?;
    ctx.assert_text_visible("tranquilidad")?;
    Ok(())
}

fn check_acceptance_buttons(ctx: &mut CaseContext) -> StepResult {
    ctx.assert_visible(&Target::link("Ver Planes"))?;
    ctx.assert_visible(&Target::link("Ver Menú"))?;
    Ok(())
}

fn check_acceptance_benefits(ctx: &mut CaseContext) -> StepResult {
    for benefit in [
        "Comida Saludable",
        "Ahorra Tiempo",
        "Variedad de Menús",
        "Entrega a Domicilio",
    ] {
        ctx.assert_text_visible(benefit)?;
    }
    Ok(())
}

fn home_page_suite() -> Suite {
    Suite::builder("home page verification")
        .use_before_each(open_home)
        .register_case(
            Case::builder("home page shows its main elements")
                .tag("smoke")
                .step("hero title", check_hero_title)
                .step("plans button", check_plans_button)
                .step("menu button", check_menu_button)
                .step("benefits section", check_benefits_section)
                .step("hero image", check_hero_image)
                .build(),
        )
        .register_case(
            Case::builder("home page loads within three seconds")
                .tag("performance")
                .step("load time", check_load_time)
                .build(),
        )
        .register_case(
            Case::builder("layout holds across viewport sizes")
                .tag("responsive")
                .step("desktop 1920x1080", check_desktop_layout)
                .step("tablet 768x1024", check_tablet_layout)
                .step("mobile 375x667", check_mobile_layout)
                .build(),
        )
        .register_case(
            Case::builder("plans button reacts to hover")
                .tag("interaction")
                .step("observe hover styling", observe_plans_button_hover)
                .build(),
        )
        .register_case(
            Case::builder("page stays usable when images fail to load")
                .tag("negative")
                .step("block image requests", block_image_requests)
                .step("content still visible", check_content_without_images)
                .build(),
        )
        .register_case(
            Case::builder("page works at the minimum supported resolution")
                .tag("negative")
                .step("320x568 viewport", check_minimum_resolution)
                .build(),
        )
        .register_case(
            Case::builder("basic accessibility checks pass")
                .tag("a11y")
                .continue_on_failure()
                .step("images have alt text", check_image_alt_text)
                .step("links are descriptive", check_link_text)
                .build(),
        )
        .register_case(
            Case::builder("acceptance: main title is shown")
                .tag("acceptance")
                .step("title", check_acceptance_title)
                .build(),
        )
        .register_case(
            Case::builder("acceptance: plan and menu buttons are shown")
                .tag("acceptance")
                .step("buttons", check_acceptance_buttons)
                .build(),
        )
        .register_case(
            Case::builder("acceptance: four benefits are listed")
                .tag("acceptance")
                .step("benefits", check_acceptance_benefits)
                .build(),
        )
        .build()
}

fn main() {
    let cli = init();
    let config = match RunConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {e}");
            eprintln!("Configuration error: {e}");
            exit(exit_code::INFRASTRUCTURE_FAILURE);
        }
    };

    let suite = home_page_suite();
    if cli.list {
        for &index in &suite.select(&config.filter) {
            let case = &suite.cases()[index];
            if case.tags().is_empty() {
                println!("{}", case.name());
            } else {
                println!("{} [{}]", case.name(), case.tags().join(", "));
            }
        }
        return;
    }

    let driver = Arc::new(ChromeDriver::new());
    match run(config, suite, driver) {
        Ok(report) => exit(report.exit_code()),
        Err(e) => {
            log::error!("Run failed: {e:#}");
            exit(exit_code::INFRASTRUCTURE_FAILURE);
        }
    }
}
