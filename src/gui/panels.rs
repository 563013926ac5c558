use eframe::egui;
use egui::{CollapsingHeader, Color32, Frame, Ui};
use egui_extras::{Column, TableBuilder};

use fabric_sim::{
    network::node::Node,
    overlay::{Tunnel, tunnel::OverlayNote},
    routing::RouteEntry,
};

pub fn collapsible_section(
    ui: &mut Ui,
    title: impl Into<egui::WidgetText>,
    default_open: bool,
    add_contents: impl FnOnce(&mut Ui),
) {
    CollapsingHeader::new(title)
        .default_open(default_open)
        .show(ui, |ui| {
            Frame::group(ui.style()).show(ui, |ui| {
                add_contents(ui);
            });
        });
}

pub fn bullet_list<I, S>(ui: &mut Ui, items: I)
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    for s in items {
        ui.horizontal(|ui| {
            ui.label("•");
            ui.label(s.to_string());
        });
    }
}

pub fn info_icon(ui: &mut Ui, tip: &str) {
    ui.add_space(4.0);
    ui.small_button("ℹ").on_hover_text(tip);
}

pub fn router_details(ui: &mut Ui, node: &Node) {
    ui.label(format!("Router: {}", node.id));
    ui.label(format!("Role: {}", node.role));
    if let Some(loopback) = node.loopback {
        ui.label(format!("Loopback: {loopback}"));
    }
    if let Some(vtep_ip) = node.vtep_ip {
        ui.label(format!("VTEP: {vtep_ip}"));
    }
}

pub fn routes_table(ui: &mut Ui, routes: &[RouteEntry]) {
    if routes.is_empty() {
        ui.label("No reachable destinations");
        return;
    }

    TableBuilder::new(ui)
        .id_salt("routes_table")
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(80.0))
        .column(Column::auto().at_least(80.0))
        .column(Column::auto().at_least(50.0))
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Destination");
            });
            header.col(|ui| {
                ui.strong("Next hop");
            });
            header.col(|ui| {
                ui.strong("Cost");
            });
        })
        .body(|mut body| {
            for route in routes {
                body.row(20.0, |mut row| {
                    row.col(|ui| {
                        ui.label(route.destination.to_string());
                    });
                    row.col(|ui| {
                        ui.label(route.next_hop.to_string());
                    });
                    row.col(|ui| {
                        ui.label(route.cost.to_string());
                    });
                });
            }
        });
}

/// Returns the index of the tunnel whose "Show" button was clicked.
pub fn tunnels_table<'a>(ui: &mut Ui, tunnels: impl IntoIterator<Item = &'a Tunnel>) -> Option<usize> {
    let mut clicked = None;

    TableBuilder::new(ui)
        .id_salt("tunnels_table")
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(70.0))
        .column(Column::auto().at_least(70.0))
        .column(Column::auto().at_least(120.0))
        .column(Column::auto().at_least(45.0))
        .column(Column::auto().at_least(40.0))
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Source");
            });
            header.col(|ui| {
                ui.strong("Destination");
            });
            header.col(|ui| {
                ui.strong("Hops");
            });
            header.col(|ui| {
                ui.strong("Cost");
            });
            header.col(|ui| {
                ui.strong("Path");
            });
        })
        .body(|mut body| {
            for (index, tunnel) in tunnels.into_iter().enumerate() {
                body.row(22.0, |mut row| {
                    row.col(|ui| {
                        ui.label(tunnel.source.to_string());
                    });
                    row.col(|ui| {
                        ui.label(tunnel.destination.to_string());
                    });
                    row.col(|ui| {
                        if tunnel.reachable {
                            let hops: Vec<String> = tunnel.hops.iter().map(ToString::to_string).collect();
                            ui.label(hops.join(" > "));
                        } else {
                            ui.colored_label(Color32::LIGHT_RED, "unreachable");
                        }
                    });
                    row.col(|ui| {
                        let cost = tunnel.cost.map(|cost| cost.to_string()).unwrap_or_else(|| "-".to_string());
                        ui.label(cost);
                    });
                    row.col(|ui| {
                        if ui
                            .add_enabled(tunnel.reachable, egui::Button::new("Show").small())
                            .on_hover_text("Highlight the underlay path in the graph")
                            .clicked()
                        {
                            clicked = Some(index);
                        }
                    });
                });
            }
        });

    clicked
}

pub fn notes_list(ui: &mut Ui, notes: &[OverlayNote]) {
    bullet_list(
        ui,
        notes.iter().map(|note| match note {
            OverlayNote::EmptySegment { segment, members } => {
                format!("VNI {segment}: {members} member(s), no tunnels")
            }
            OverlayNote::UnknownSegment { segment } => format!("VNI {segment}: not configured"),
        }),
    );
}
