// src/render.rs
//! maud markup for the storefront. Every interactive element posts to a
//! `/ui/...` route with htmx; the response replaces `#app` (or `#grid` for
//! search and filtering).

use maud::{DOCTYPE, Markup, html};

use crate::auth_models::AuthMode;
use crate::catalog::CategoryOption;
use crate::form::FormMode;
use crate::session::SessionContext;
use crate::storefront::Storefront;
use crate::view::{GridView, ListingCard};

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@2.0.4";

pub fn render_page(store: &Storefront) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Marketplace" }
                link rel="stylesheet" href="/static/app.css";
                script src=(HTMX_SRC) defer {}
            }
            body hx-target="#app" hx-swap="outerHTML" {
                (render_app(store))
            }
        }
    }
}

/// Everything below `<body>`; the fragment most UI routes return.
pub fn render_app(store: &Storefront) -> Markup {
    html! {
        div #app {
            (header(store.session()))
            @if let Some(message) = store.notice() {
                div #notice .notice role="alert" {
                    span { (message) }
                    button .btn.small.secondary hx-post="/ui/notice/dismiss" { "OK" }
                }
            }
            (toolbar(store))
            (render_grid(&store.grid()))
            @if let Some(mode) = store.auth_mode() {
                (auth_dialog(mode, store.auth_error()))
            }
            @if store.listing_form().is_open() {
                (listing_dialog(store))
            }
            @if store.is_admin_open() {
                (admin_dialog(store))
            }
            @if let Some(pending) = store.pending() {
                dialog #confirm-modal open {
                    p { (pending.prompt()) }
                    div .actions {
                        button #confirm-delete .btn.danger hx-post="/ui/deletion/confirm" { "Delete" }
                        button .btn.secondary hx-post="/ui/deletion/cancel" { "Cancel" }
                    }
                }
            }
        }
    }
}

fn header(session: &SessionContext) -> Markup {
    let signed_in = session.is_signed_in();
    html! {
        header .topbar {
            h1 { "Marketplace" }
            nav {
                span #user-email {
                    @if let Some(user) = session.user() { (user.email) }
                }
                button #btn-login .btn.hidden[signed_in] hx-post="/ui/auth/login" { "Login" }
                button #btn-register .btn.secondary.hidden[signed_in] hx-post="/ui/auth/register" { "Register" }
                button #btn-logout .btn.secondary.hidden[!signed_in] hx-post="/ui/logout" { "Logout" }
                button #btn-admin .btn.hidden[!session.is_admin()] hx-post="/ui/admin/open" { "Admin" }
            }
        }
    }
}

fn category_options(options: &[CategoryOption], selected: &str, empty_label: &str) -> Markup {
    html! {
        option value="" selected[selected.is_empty()] { (empty_label) }
        @for option in options {
            option value=(option.value) selected[option.value == selected] { (option.label) }
        }
    }
}

fn toolbar(store: &Storefront) -> Markup {
    let query = store.query();
    html! {
        form #toolbar .toolbar {
            button #btn-new .btn type="button" hx-post="/ui/listings/new" { "New Listing" }
            input #search type="search" name="search" placeholder="Search listings…"
                value=(query.search)
                hx-post="/ui/search"
                hx-trigger="input changed delay:200ms"
                hx-include="#toolbar"
                hx-target="#grid";
            select #category-filter name="category"
                hx-post="/ui/category-filter"
                hx-trigger="change"
                hx-include="#toolbar"
                hx-target="#grid" {
                (category_options(store.catalog().category_options(), &query.category, "All categories"))
            }
            button #btn-clear .btn.secondary type="button" hx-post="/ui/filters/clear" { "Clear" }
        }
    }
}

pub fn render_grid(grid: &GridView) -> Markup {
    html! {
        section #grid .grid {
            @match grid {
                GridView::Empty { message } => {
                    p .empty { (message) }
                }
                GridView::Cards(cards) => {
                    @for card in cards { (listing_card(card)) }
                }
            }
        }
    }
}

fn listing_card(card: &ListingCard) -> Markup {
    html! {
        article .card data-id=(card.id) {
            img src=(card.image_url) alt=(card.title) loading="lazy";
            div .card-body {
                h3 { (card.title) }
                p .meta { (card.category) " · " (card.price_label) }
                p .owner { (card.owner_email) }
                @if !card.excerpt.is_empty() {
                    p .description { (card.excerpt) }
                }
                @if card.editable {
                    div .actions {
                        button .btn.small data-edit=(card.id)
                            hx-post=(format!("/ui/listings/{}/edit", card.id))
                            hx-target="#app" { "Edit" }
                        button .btn.small.danger data-del=(card.id)
                            hx-post=(format!("/ui/listings/{}/delete", card.id))
                            hx-target="#app" { "Delete" }
                    }
                }
            }
        }
    }
}

fn auth_dialog(mode: AuthMode, error: Option<&str>) -> Markup {
    html! {
        dialog #auth-modal open {
            form hx-post="/ui/auth/submit" {
                h2 #auth-title { (mode) }
                label { "Email" input #auth-email type="email" name="email" required; }
                label { "Password" input #auth-pass type="password" name="password" required; }
                p #auth-error .error { @if let Some(error) = error { (error) } }
                div .actions {
                    button #auth-submit .btn type="submit" { (mode) }
                    button .btn.secondary type="button" hx-post="/ui/auth/close" { "Cancel" }
                }
                p #auth-switch .hint { (mode.hint()) }
            }
        }
    }
}

fn listing_dialog(store: &Storefront) -> Markup {
    let form = store.listing_form();
    let draft = form.draft();
    html! {
        dialog #listing-modal open {
            form hx-post="/ui/listings/save" hx-encoding="multipart/form-data" {
                h2 #listing-title { (form.heading()) }
                @if let FormMode::Edit(id) = form.mode() {
                    input #l-id type="hidden" name="id" value=(id);
                }
                label { "Title" input #l-title name="title" value=(draft.title); }
                label { "Price" input #l-price name="price" inputmode="decimal" value=(draft.price); }
                label {
                    "Category"
                    select #l-category name="category" {
                        (category_options(store.catalog().category_options(), &draft.category, "Select…"))
                    }
                }
                label { "Description" textarea #l-desc name="description" rows="4" { (draft.description) } }
                label { "Image" input #l-image type="file" name="image" accept="image/*"; }
                p #listing-error .error { @if let Some(error) = form.error() { (error) } }
                div .actions {
                    button #listing-save .btn type="submit" { "Save" }
                    button .btn.secondary type="button" hx-post="/ui/listings/close" { "Cancel" }
                }
            }
        }
    }
}

fn admin_dialog(store: &Storefront) -> Markup {
    html! {
        dialog #admin-modal open {
            h2 { "Categories" }
            form .inline hx-post="/ui/categories" {
                input #cat-name name="name" placeholder="Name";
                input #cat-slug name="slug" placeholder="slug (optional)";
                button #cat-add .btn type="submit" { "Add" }
            }
            p #admin-error .error { @if let Some(error) = store.admin_error() { (error) } }
            ul #cat-list {
                @for category in store.catalog().categories() {
                    li {
                        span { (category.name) " " code { (category.slug) } }
                        button .btn.small.secondary data-del-cat=(category.id)
                            hx-post=(format!("/ui/categories/{}/delete", category.id)) { "Delete" }
                    }
                }
            }
            div .actions {
                button .btn.secondary hx-post="/ui/admin/close" { "Close" }
            }
        }
    }
}
