//! Prompt construction for the four stages
//!
//! Each prompt embeds the full output of the stage before it. The system
//! instruction is added by the completion client, not here. Articles are
//! written in Spanish.

/// Opening words of each prompt, in stage order
pub const PROMPT_OPENINGS: [&str; 4] = [
    "Genera un esquema detallado",
    "Usa exclusivamente el siguiente esquema",
    "Evalúa este artículo",
    "Teniendo en cuenta el siguiente artículo",
];

pub fn planning_prompt(topic: &str, title: Option<&str>) -> String {
    format!(
        "{opening} para un artículo optimizado para SEO sobre: {topic}.\n\
         Título sugerido: {title}\n\
         Incluye:\n\
         – Intención de búsqueda.\n\
         – Palabras clave principales y secundarias.\n\
         – Estructura H1/H2/H3 muy específica.\n\
         – Puntos clave que deben cubrirse en cada sección.\n\
         – Ejemplos concretos para mejorar calidad.\n\
         No escribas el contenido. Solo el plan.",
        opening = PROMPT_OPENINGS[0],
        topic = topic,
        title = title.unwrap_or("(ninguno)"),
    )
}

pub fn drafting_prompt(plan: &str) -> String {
    format!(
        "{opening} para redactar el artículo.\n\
         No añadas nuevas secciones.\n\
         Mantén claridad, precisión y evita relleno.\n\
         Incluye datos verificables o neutrales cuando proceda.\n\
         Aplica densidad de palabra clave moderada.\n\
         No repitas ideas con sinónimos.\n\
         Aquí tienes el esquema:\n\
         {plan}\n\n\
         Escribe el artículo completo en formato HTML (usa etiquetas h1, h2, p, ul, li, \
         etc. pero sin etiquetas html/body).",
        opening = PROMPT_OPENINGS[1],
        plan = plan,
    )
}

pub fn reviewing_prompt(draft: &str) -> String {
    format!(
        "{opening}.\n\
         Identifica:\n\
         – frases redundantes\n\
         – afirmaciones débiles\n\
         – repeticiones innecesarias\n\
         – oportunidades de mayor claridad\n\
         – sobreoptimización SEO\n\
         Sugiere correcciones concretas sin reescribir todo el texto.\n\
         Aquí está el artículo:\n\
         {draft}",
        opening = PROMPT_OPENINGS[2],
        draft = draft,
    )
}

pub fn finalizing_prompt(draft: &str, critique: &str) -> String {
    format!(
        "{opening} y la revisión crítica, genera la versión final y pulida del artículo.\n\
         Aplica las correcciones sugeridas.\n\
         Devuelve SOLO el código HTML del artículo final (sin bloques de código markdown, \
         solo el contenido).\n\n\
         Artículo original:\n\
         {draft}\n\n\
         Revisión:\n\
         {critique}",
        opening = PROMPT_OPENINGS[3],
        draft = draft,
        critique = critique,
    )
}
