use ammonia::Builder;

pub fn sanitize_html(html: &str) -> String {
    // Use safe defaults - no script tags allowed
    create_secure_sanitizer().clean(html).to_string()
}

pub fn sanitize_with_options(html: &str, allow_task_checkboxes: bool) -> String {
    if allow_task_checkboxes {
        // Checklist items render as disabled checkbox inputs
        let mut builder = create_secure_sanitizer();
        builder
            .add_tags(&["input"])
            .add_tag_attributes("input", &["type", "checked", "disabled"]);
        builder.clean(html).to_string()
    } else {
        create_secure_sanitizer().clean(html).to_string()
    }
}

fn create_secure_sanitizer() -> Builder<'static> {
    // ammonia's default settings already allow <mark>, <del> and <pre>
    Builder::new()
}
