use chrono::{Datelike, Utc};

const PAGE_BASE_STYLES: &str = r#"
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 2rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        main { padding: 2rem 1.5rem; max-width: 720px; margin: 0 auto; box-sizing: border-box; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; }
        label { display: block; margin-bottom: 0.5rem; font-weight: 600; }
        input { width: 100%; padding: 0.75rem; border-radius: 8px; border: 1px solid #cbd5f5; box-sizing: border-box; margin-bottom: 1rem; }
        button { padding: 0.85rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        .note { color: #475569; font-size: 0.95rem; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
"#;

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render_footer() -> String {
    format!(
        r#"<footer class="app-footer">Primary Care Companion · {}</footer>"#,
        Utc::now().year()
    )
}

fn render_shell(title: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{styles}</style>
</head>
<body>
    <header><h1>{heading}</h1></header>
    <main>
{body}
        {footer}
    </main>
</body>
</html>"#,
        title = title,
        styles = PAGE_BASE_STYLES,
        heading = heading,
        body = body,
        footer = render_footer(),
    )
}

pub fn render_login_page() -> String {
    render_shell(
        "Iniciar sesión | Primary Care Companion",
        "Acceso de profesores",
        r#"        <section class="panel">
            <form method="post" action="/api/auth/login" id="login-form">
                <label for="email">Email</label>
                <input type="email" id="email" name="email" required>
                <label for="password">Contraseña</label>
                <input type="password" id="password" name="password" required>
                <button type="submit">Entrar</button>
            </form>
            <p class="note">Las sesiones duran 7 días.</p>
        </section>
"#,
    )
}

pub fn render_dashboard_page(professor_name: &str) -> String {
    let name = escape_html(professor_name);
    render_shell(
        "Panel de administración | Primary Care Companion",
        "Panel de administración",
        &format!(
            r#"        <section class="panel">
            <p>Sesión iniciada como <strong>{name}</strong>.</p>
            <p class="note">La gestión de profesores, recursos y sesiones se realiza a través de la API de administración.</p>
        </section>
"#,
        ),
    )
}

pub fn render_notes_page(professor_name: &str) -> String {
    let name = escape_html(professor_name);
    render_shell(
        "Añadir recursos | Primary Care Companion",
        "Añadir recursos",
        &format!(
            r#"        <section class="panel">
            <p>Sesión iniciada como <strong>{name}</strong>.</p>
            <p class="note">Los recursos educativos se gestionan a través de <code>/api/resources</code>.</p>
        </section>
"#,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_entities() {
        assert_eq!(
            escape_html(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn login_page_posts_to_session_api() {
        let html = render_login_page();
        assert!(html.contains(r#"action="/api/auth/login""#));
    }

    #[test]
    fn dashboard_escapes_the_professor_name() {
        let html = render_dashboard_page("<script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
