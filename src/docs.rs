//! Interactive documentation page served next to the spec JSON.

use minijinja::{context, Environment};
use tracing::error;

const SWAGGER_UI: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>API documentation</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({
        url: "{{ spec_url }}",
        dom_id: "#swagger-ui",
        deepLinking: true,
      });
    };
  </script>
</body>
</html>
"#;

/// Default page: Swagger UI loading the document from `spec_url`.
pub fn swagger_ui(spec_url: &str) -> String {
    let mut env = Environment::new();
    let rendered = env
        .add_template("swagger_ui", SWAGGER_UI)
        .and_then(|()| env.get_template("swagger_ui"))
        .and_then(|tmpl| tmpl.render(context! { spec_url }));
    match rendered {
        Ok(html) => html,
        Err(e) => {
            error!(error = %e, "Failed to render documentation page");
            format!("<a href=\"{spec_url}\">{spec_url}</a>")
        }
    }
}
