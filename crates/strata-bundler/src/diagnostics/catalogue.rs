//! Pre-registered message catalogue.
//!
//! Codes are grouped in bands: info 100-199, warnings 200-299, errors
//! 300-399, reports 400-499. Symbolic names are stable across releases;
//! callers match on them to detect known failure classes.

/// `(order, code, symbolic name, template)`.
pub(super) const CATALOGUE: &[(u32, u32, &str, &str)] = &[
    // info
    (1, 100, "legacyAssumed", "Assumed module uses legacy loader API."),
    (1, 102, "optimize", "Optimizing module"),
    (1, 103, "optimizeDone", "Optimizing module complete."),
    (1, 104, "optimizeMessages", "Optimizer messages."),
    (1, 105, "pacify", ""),
    (1, 106, "cssOptimize", "Optimizing CSS."),
    (1, 107, "packageVersion", "Package Version:"),
    (1, 108, "internStrings", "Interning strings."),
    (1, 109, "flattenResources", "Flattening resource bundles."),
    // warnings
    (1, 210, "inputDeprecatedStripConsole", "Given strip console value is deprecated."),
    (1, 211, "inputDeprecated", "Deprecated switch; ignored"),
    (1, 214, "ignoringReleaseDirName", "DestBasePath given; ignoring releaseDir and releaseName."),
    (1, 216, "dojoHasUnresolvedMid", "dojo/has plugin resource could not be resolved during build-time."),
    (1, 217, "configUndeclaredPackage", "Layer references a package with no declared location; using the default sibling location."),
    (1, 218, "configInvalidPackageOverride", "Per-package default config may not set name or location; ignored."),
    (1, 219, "internMissingResource", "Resource referenced for interning could not be read."),
    // errors
    (1, 301, "dojoHasMissingModule", "Module chosen by dojo/has at build-time could not be resolved."),
    (1, 303, "amdMissingLayerIncludeModule", "Missing include module for layer."),
    (1, 304, "amdMissingLayerExcludeModule", "Missing exclude module for layer."),
    (1, 311, "amdMissingDependency", "Missing dependency."),
    (1, 312, "optimizeFailedWrite", "Failed to write optimized file."),
    (1, 313, "cssOptimizeFailed", "Failed to optimize CSS file."),
    (1, 315, "inputInvalidPath", "Unable to compute absolute path."),
    (1, 317, "inputUnknownStripConsole", "Unknown strip console value."),
    (1, 318, "inputUnknownLayerOptimize", "Unknown layer optimize value."),
    (1, 319, "inputUnknownOptimize", "Unknown optimize value."),
    (1, 322, "inputNoLoaderForBoot", "Unable to find loader for boot layer."),
    (1, 324, "transformFailed", "Error while transforming resource."),
    (1, 325, "discoveryFailed", "Failed to discover any resources to transform. Nothing to do; terminating application"),
    (1, 327, "outputCollide", "Multiple resources are destined for same filename."),
    (1, 329, "layerToMidFailed", "Failed to resolve layer name into a module identifier."),
    (1, 330, "layerMissingDependency", "Failed to resolve layer dependency."),
    (1, 332, "invalidMessageId", "Invalid message identifier."),
    (1, 337, "amdCircularDependency", "Cycle detected in module or layer dependencies."),
    (1, 338, "writeFailed", "Failed to write one or more artifacts."),
    // reports
    (1, 400, "hasReport", "Has Features Detected"),
    (3, 499, "signoff", "Process completed normally:"),
];

/// Highest pre-registered report code; [`Diagnostics::new_message_id`](super::Diagnostics::new_message_id)
/// counts up from here for reports.
pub(super) const LAST_REPORT_ID: u32 = 400;

/// Custom non-report codes are allocated above this.
pub(super) const LAST_USER_ID: u32 = 500;

/// Echoed even though they are not warnings or errors.
pub(super) const EXTRA_PACIFIED: &[&str] = &["pacify", "packageVersion", "signoff"];
