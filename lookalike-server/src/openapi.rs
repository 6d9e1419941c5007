//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::handlers::{HealthResponse, MatchResponse, ReadyResponse, UploadForm, UploadResponse};

/// Lookalike image lookup API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lookalike - Image Lookup API",
        version = "0.1.0",
        description = r#"
## Reverse image lookup against a curated reference set

Upload an image and find out whether it, or something visually close to it,
is already among the reference images.

### Matching stages

1. **Exact** - identical 64-bit perceptual fingerprint
2. **Near hash** - fingerprint similarity of at least 75%
3. **Features** - ORB keypoint matching, for cropped or partial copies

The first stage with results wins. `matchScore` is a percentage for the
hash stages and a keypoint count for the feature stage (see `scoreKind`).
Reference images are served under `/our_images/{filename}`.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    tags(
        (name = "Matching", description = "Look up uploaded images in the reference corpus"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::index,
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::upload::upload_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            UploadForm,
            UploadResponse,
            MatchResponse,
        )
    )
)]
pub struct ApiDoc;
